use super::{js_seed_literal, POSITION_HASH_JS};
use crate::model::Fingerprint;

pub(super) fn build(fp: &Fingerprint) -> Option<String> {
    if fp.audio_noise <= 0.0 {
        return None;
    }
    let seed = js_seed_literal(fp);
    let float_amplitude = fp.audio_noise;
    let reduction_db = -((seed % 12) as f64);

    Some(format!(
        r#"
{POSITION_HASH_JS}
  const __m_audio_seed = {seed};
  const __m_float_amplitude = {float_amplitude};
  const __m_reduction_db = {reduction_db};
  const __m_buffer_ids = new WeakMap();
  let __m_next_buffer_id = 1;

  function __m_buffer_id(buffer) {{
    let id = __m_buffer_ids.get(buffer);
    if (id === undefined) {{
      id = __m_next_buffer_id++;
      __m_buffer_ids.set(buffer, id);
    }}
    return id;
  }}

  if (typeof BaseAudioContext !== 'undefined') {{
    const __m_real_createBuffer = BaseAudioContext.prototype.createBuffer;
    BaseAudioContext.prototype.createBuffer = function(...args) {{
      const buf = __m_real_createBuffer.apply(this, args);
      __m_buffer_id(buf);
      return buf;
    }};
  }}

  if (typeof AudioBuffer !== 'undefined') {{
    const __m_real_getChannelData = AudioBuffer.prototype.getChannelData;
    AudioBuffer.prototype.getChannelData = function(channel) {{
      const data = __m_real_getChannelData.call(this, channel);
      const bufId = __m_buffer_id(this);
      for (let i = 0; i < data.length; i++) {{
        const delta = __m_position_delta(i, 0, channel, __m_audio_seed ^ bufId, 1000) / 1000 * __m_float_amplitude;
        data[i] = Math.min(1, Math.max(-1, data[i] + delta));
      }}
      return data;
    }};

    const __m_real_copyFromChannel = AudioBuffer.prototype.copyFromChannel;
    AudioBuffer.prototype.copyFromChannel = function(dest, channel, startInChannel) {{
      __m_real_copyFromChannel.call(this, dest, channel, startInChannel || 0);
      const bufId = __m_buffer_id(this);
      const offset = startInChannel || 0;
      for (let i = 0; i < dest.length; i++) {{
        const delta = __m_position_delta(i + offset, 0, channel, __m_audio_seed ^ bufId, 1000) / 1000 * __m_float_amplitude;
        dest[i] = Math.min(1, Math.max(-1, dest[i] + delta));
      }}
    }};
  }}

  if (typeof AnalyserNode !== 'undefined') {{
    const __m_real_getFloatFrequencyData = AnalyserNode.prototype.getFloatFrequencyData;
    AnalyserNode.prototype.getFloatFrequencyData = function(array) {{
      __m_real_getFloatFrequencyData.call(this, array);
      for (let i = 0; i < array.length; i++) {{
        array[i] += __m_position_delta(i, 0, 0, __m_audio_seed, 1000) / 1000 * __m_float_amplitude;
      }}
    }};
    const __m_real_getByteFrequencyData = AnalyserNode.prototype.getByteFrequencyData;
    AnalyserNode.prototype.getByteFrequencyData = function(array) {{
      __m_real_getByteFrequencyData.call(this, array);
      for (let i = 0; i < array.length; i++) {{
        const delta = __m_position_delta(i, 0, 1, __m_audio_seed, 1);
        array[i] = Math.min(255, Math.max(0, array[i] + delta));
      }}
    }};
    const __m_real_getFloatTimeDomainData = AnalyserNode.prototype.getFloatTimeDomainData;
    AnalyserNode.prototype.getFloatTimeDomainData = function(array) {{
      __m_real_getFloatTimeDomainData.call(this, array);
      for (let i = 0; i < array.length; i++) {{
        array[i] += __m_position_delta(i, 0, 2, __m_audio_seed, 1000) / 1000 * __m_float_amplitude;
      }}
    }};
    const __m_real_getByteTimeDomainData = AnalyserNode.prototype.getByteTimeDomainData;
    AnalyserNode.prototype.getByteTimeDomainData = function(array) {{
      __m_real_getByteTimeDomainData.call(this, array);
      for (let i = 0; i < array.length; i++) {{
        const delta = __m_position_delta(i, 0, 3, __m_audio_seed, 1);
        array[i] = Math.min(255, Math.max(0, array[i] + delta));
      }}
    }};
  }}

  if (typeof OfflineAudioContext !== 'undefined') {{
    const __m_real_startRendering = OfflineAudioContext.prototype.startRendering;
    OfflineAudioContext.prototype.startRendering = function(...args) {{
      const result = __m_real_startRendering.apply(this, args);
      if (result && typeof result.then === 'function') {{
        return result.then((buffer) => {{
          __m_buffer_id(buffer);
          return buffer;
        }});
      }}
      return result;
    }};
  }}

  if (typeof DynamicsCompressorNode !== 'undefined') {{
    Object.defineProperty(DynamicsCompressorNode.prototype, 'reduction', {{
      get() {{ return __m_reduction_db; }}, configurable: true,
    }});
  }}
"#,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint;
    use crate::model::{BehaviourProfile, BrowserToken, OsToken, Profile, ProfileStatus};

    fn profile(seed: u32) -> Profile {
        Profile {
            id: "p".into(),
            display_name: "p".into(),
            seed,
            os: OsToken::Windows11,
            browser: BrowserToken::Chrome,
            target_url_hint: None,
            proxy: None,
            behaviour_profile: BehaviourProfile::Normal,
            status: ProfileStatus::Idle,
        }
    }

    #[test]
    fn zero_audio_noise_skips_the_surface() {
        let mut fp = fingerprint::synthesize(&profile(1));
        fp.audio_noise = 0.0;
        assert!(build(&fp).is_none());
    }

    #[test]
    fn script_patches_channel_data_and_compressor_reduction() {
        let mut fp = fingerprint::synthesize(&profile(1));
        fp.audio_noise = 0.3;
        let script = build(&fp).unwrap();
        assert!(script.contains("AudioBuffer.prototype.getChannelData"));
        assert!(script.contains("AnalyserNode.prototype.getByteFrequencyData"));
        assert!(script.contains("DynamicsCompressorNode.prototype"));
    }

    #[test]
    fn reduction_db_stays_within_the_documented_range() {
        for seed in 0u32..50 {
            let mut fp = fingerprint::synthesize(&profile(seed));
            fp.audio_noise = 0.5;
            let script = build(&fp).unwrap();
            // __m_reduction_db is emitted as a literal float in [-11, 0].
            let marker = "__m_reduction_db = ";
            let start = script.find(marker).unwrap() + marker.len();
            let rest = &script[start..];
            let end = rest.find(';').unwrap();
            let value: f64 = rest[..end].trim().parse().unwrap();
            assert!((-11.0..=0.0).contains(&value));
        }
    }
}
