use crate::model::{Fingerprint, WebRtcMode};

fn build_block() -> String {
    r#"
  const __m_real_generateCertificate = window.RTCPeerConnection && window.RTCPeerConnection.generateCertificate;
  class __m_StubPeerConnection {
    constructor() { this.iceConnectionState = 'new'; this.connectionState = 'new'; this._listeners = {}; }
    addEventListener(type, fn) { (this._listeners[type] ||= []).push(fn); }
    removeEventListener() {}
    createOffer() { return Promise.resolve({ type: 'offer', sdp: '' }); }
    createAnswer() { return Promise.resolve({ type: 'answer', sdp: '' }); }
    setLocalDescription() { return Promise.resolve(); }
    setRemoteDescription() { return Promise.resolve(); }
    addIceCandidate() { return Promise.resolve(); }
    createDataChannel() { throw new DOMException('WebRTC disabled', 'NotSupportedError'); }
    close() {}
    getStats() { return Promise.resolve(new Map()); }
  }
  if (__m_real_generateCertificate) {
    __m_StubPeerConnection.generateCertificate = __m_real_generateCertificate;
  }
  window.RTCPeerConnection = __m_StubPeerConnection;
  window.webkitRTCPeerConnection = __m_StubPeerConnection;
"#
    .to_string()
}

fn build_fake_mdns(mdns_host: &str, fake_ip: &str) -> String {
    format!(
        r#"
  const __m_mdns_host = {mdns_host:?};
  const __m_fake_ip = {fake_ip:?};
  const __m_real_pc = window.RTCPeerConnection;

  function __m_rewrite_candidate(candidate) {{
    if (!candidate) return candidate;
    const parts = candidate.split(' ');
    if (parts.length < 5) return candidate;
    const typIndex = parts.indexOf('typ');
    const kind = typIndex >= 0 ? parts[typIndex + 1] : null;
    const ipPart = parts[4];
    const isIPv6LinkLocal = ipPart.toLowerCase().startsWith('fe80:');
    if (kind === 'host' || isIPv6LinkLocal) {{
      parts[4] = __m_mdns_host;
    }} else if (kind === 'srflx') {{
      parts[4] = __m_fake_ip;
      const raddrIndex = parts.indexOf('raddr');
      if (raddrIndex >= 0) parts[raddrIndex + 1] = '0.0.0.0';
    }}
    return parts.join(' ');
  }}

  function __m_rewrite_sdp(sdp) {{
    if (!sdp) return sdp;
    return sdp
      .split('\r\n')
      .map((line) => (line.startsWith('a=candidate:') ? 'a=' + __m_rewrite_candidate(line.slice(2)) : line))
      .join('\r\n');
  }}

  class __m_MaskedPeerConnection extends __m_real_pc {{
    constructor(...args) {{
      super(...args);
      this.addEventListener('icecandidate', (ev) => {{
        if (ev.candidate && ev.candidate.candidate) {{
          const rewritten = __m_rewrite_candidate(ev.candidate.candidate);
          Object.defineProperty(ev.candidate, 'candidate', {{ value: rewritten, configurable: true }});
        }}
      }});
    }}
    async createOffer(...args) {{
      const offer = await super.createOffer(...args);
      offer.sdp = __m_rewrite_sdp(offer.sdp);
      return offer;
    }}
    async createAnswer(...args) {{
      const answer = await super.createAnswer(...args);
      answer.sdp = __m_rewrite_sdp(answer.sdp);
      return answer;
    }}
  }}
  window.RTCPeerConnection = __m_MaskedPeerConnection;
  window.webkitRTCPeerConnection = __m_MaskedPeerConnection;

  if (navigator.mediaDevices && navigator.mediaDevices.enumerateDevices) {{
    const __m_real_enumerate = navigator.mediaDevices.enumerateDevices.bind(navigator.mediaDevices);
    navigator.mediaDevices.enumerateDevices = async function() {{
      const real = await __m_real_enumerate();
      return real.map((d, i) => ({{
        deviceId: {seeded_device_uuid:?}.replace('0', String(i % 10)),
        kind: d.kind,
        label: '',
        groupId: '',
      }}));
    }};
  }}
"#,
        seeded_device_uuid = mdns_host.trim_end_matches(".local"),
    )
}

pub(super) fn build(fp: &Fingerprint) -> Option<String> {
    match fp.webrtc.mode {
        WebRtcMode::Block => Some(build_block()),
        WebRtcMode::FakeMdns => {
            let mdns = fp.webrtc.fake_mdns.as_deref().unwrap_or("00000000-0000-4000-8000-000000000000.local");
            let ip = fp.webrtc.fake_ip.as_deref().unwrap_or("10.0.0.1");
            Some(build_fake_mdns(mdns, ip))
        }
        WebRtcMode::Passthrough => None,
    }
}

/// Rust mirror of the in-page `__m_rewrite_candidate` function emitted by
/// `build_fake_mdns`. The real rewrite only ever runs inside the patched
/// page's JS engine, so this copy is what a Rust test actually exercises
/// for the candidate-string-in/masked-string-out masking behaviour — the
/// two implementations must be kept in lockstep by hand, the same way
/// `rng::position_delta` and `POSITION_HASH_JS` are kept in lockstep for
/// the noise hash.
#[cfg(test)]
fn rewrite_candidate(candidate: &str, mdns_host: &str, fake_ip: &str) -> String {
    let mut parts: Vec<&str> = candidate.split(' ').collect();
    if parts.len() < 5 {
        return candidate.to_string();
    }
    let typ_index = parts.iter().position(|p| *p == "typ");
    let kind = typ_index.and_then(|i| parts.get(i + 1)).copied();
    let is_ipv6_link_local = parts[4].to_ascii_lowercase().starts_with("fe80:");

    if kind == Some("host") || is_ipv6_link_local {
        parts[4] = mdns_host;
    } else if kind == Some("srflx") {
        parts[4] = fake_ip;
        if let Some(raddr_index) = parts.iter().position(|p| *p == "raddr") {
            if let Some(slot) = parts.get_mut(raddr_index + 1) {
                *slot = "0.0.0.0";
            }
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint;
    use crate::model::{BehaviourProfile, BrowserToken, OsToken, Profile, ProfileStatus, ProxyRef};

    /// A host candidate's IP literal is replaced by the mDNS hostname;
    /// priority and port are untouched.
    #[test]
    fn host_candidate_rewrite_replaces_only_the_ip_field() {
        let input = "candidate:1 1 udp 2122260223 192.168.1.42 58321 typ host generation 0";
        let rewritten = rewrite_candidate(input, "abcdef01-2345-4678-89ab-cdef01234567.local", "10.0.0.9");
        assert_eq!(
            rewritten,
            "candidate:1 1 udp 2122260223 abcdef01-2345-4678-89ab-cdef01234567.local 58321 typ host generation 0"
        );
    }

    #[test]
    fn srflx_candidate_gets_fake_ip_and_zeroed_raddr() {
        let input = "candidate:2 1 udp 1686052607 203.0.113.5 12345 typ srflx raddr 192.168.1.42 rport 58321";
        let rewritten = rewrite_candidate(input, "uuid.local", "198.51.100.7");
        assert!(rewritten.contains("198.51.100.7"));
        assert!(rewritten.contains("raddr 0.0.0.0"));
        assert!(!rewritten.contains("192.168.1.42"));
    }

    #[test]
    fn relay_candidate_passes_through_untouched() {
        let input = "candidate:3 1 udp 16777215 198.51.100.9 3478 typ relay raddr 203.0.113.5 rport 12345";
        let rewritten = rewrite_candidate(input, "uuid.local", "10.0.0.1");
        assert_eq!(rewritten, input);
    }

    #[test]
    fn ipv6_link_local_is_scrubbed_like_a_host_candidate() {
        let input = "candidate:1 1 udp 2122260223 fe80::1ff:fe23:4567:890a 58321 typ host generation 0";
        let rewritten = rewrite_candidate(input, "uuid.local", "10.0.0.1");
        assert!(rewritten.contains("uuid.local"));
        assert!(!rewritten.to_lowercase().contains("fe80"));
    }

    fn profile(seed: u32, proxy: Option<ProxyRef>) -> Profile {
        Profile {
            id: "p".into(),
            display_name: "p".into(),
            seed,
            os: OsToken::Windows11,
            browser: BrowserToken::Chrome,
            target_url_hint: None,
            proxy,
            behaviour_profile: BehaviourProfile::Normal,
            status: ProfileStatus::Idle,
        }
    }

    #[test]
    fn fake_mdns_script_embeds_the_session_uuid_and_fake_ip() {
        let p = profile(
            1,
            Some(ProxyRef { endpoint: "x:1".into(), country_hint: None, tls_bridge: false }),
        );
        let fp = fingerprint::synthesize(&p);
        let script = build(&fp).unwrap();
        assert!(script.contains(fp.webrtc.fake_mdns.as_deref().unwrap()));
        assert!(script.contains(fp.webrtc.fake_ip.as_deref().unwrap()));
        assert!(script.contains("__m_rewrite_candidate"));
    }

    #[test]
    fn block_mode_stub_never_emits_ice_candidates() {
        let p = profile(2, None);
        // seed 2 without a proxy lands on block or passthrough depending
        // on the synthesiser's coin flip; force block explicitly here
        // since that's the behaviour under test.
        let mut fp = fingerprint::synthesize(&p);
        fp.webrtc.mode = crate::model::WebRtcMode::Block;
        let script = build(&fp).unwrap();
        assert!(script.contains("__m_StubPeerConnection"));
        assert!(!script.contains("icecandidate"));
    }

    #[test]
    fn passthrough_mode_installs_no_script() {
        let p = profile(3, None);
        let mut fp = fingerprint::synthesize(&p);
        fp.webrtc.mode = crate::model::WebRtcMode::Passthrough;
        assert!(build(&fp).is_none());
    }
}
