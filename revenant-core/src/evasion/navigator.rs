use crate::model::{Fingerprint, PermissionState};

fn permission_state_js(state: PermissionState) -> &'static str {
    match state {
        PermissionState::Granted => "granted",
        PermissionState::Denied => "denied",
        PermissionState::Prompt => "prompt",
    }
}

pub(super) fn build(fp: &Fingerprint) -> Option<String> {
    let mut perm_entries = String::new();
    for (name, state) in &fp.permissions {
        perm_entries.push_str(&format!(
            "    {:?}: {:?},\n",
            name,
            permission_state_js(*state)
        ));
    }

    Some(format!(
        r#"
  const __m_permissions = {{
{perm_entries}  }};
  Object.defineProperty(Navigator.prototype, 'hardwareConcurrency', {{
    get() {{ return {hw}; }}, configurable: true,
  }});
  Object.defineProperty(Navigator.prototype, 'deviceMemory', {{
    get() {{ return {mem}; }}, configurable: true,
  }});
  Object.defineProperty(Navigator.prototype, 'webdriver', {{
    get() {{ return false; }}, configurable: true,
  }});
  const __m_real_query = Permissions.prototype.query;
  Permissions.prototype.query = function(desc) {{
    const name = desc && desc.name;
    if (Object.prototype.hasOwnProperty.call(__m_permissions, name)) {{
      return Promise.resolve({{
        name,
        state: __m_permissions[name],
        onchange: null,
        addEventListener() {{}},
        removeEventListener() {{}},
      }});
    }}
    return __m_real_query.call(this, desc);
  }};
"#,
        hw = fp.hardware_concurrency,
        mem = fp.device_memory,
    ))
}
