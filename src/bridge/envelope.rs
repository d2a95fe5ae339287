use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;
use tokio_tungstenite::tungstenite::Message;

use crate::config::RealtimeConfig;

/// Events the bridge itself authors on the upstream leg.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum UpstreamEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionParams },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioAppend { audio: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionParams {
    pub voice: String,
    pub instructions: String,
}

impl UpstreamEvent {
    pub fn session_update(config: &RealtimeConfig) -> Self {
        UpstreamEvent::SessionUpdate {
            session: SessionParams {
                voice: config.voice.clone(),
                instructions: config.instructions(),
            },
        }
    }

    pub fn audio_append(samples: &[u8]) -> Self {
        UpstreamEvent::InputAudioAppend {
            audio: BASE64.encode(samples),
        }
    }

    pub fn into_message(self) -> Message {
        // Both variants hold only strings, serialization cannot fail.
        Message::Text(serde_json::to_string(&self).unwrap_or_default())
    }
}

/// Maps a frame from the media relay onto the upstream wire format.
///
/// Text frames are already upstream control events and pass through untouched.
/// Binary frames are one block of raw audio and get wrapped in an
/// `input_audio_buffer.append` envelope. Control frames are not forwarded.
pub fn translate_inbound(msg: Message) -> Option<Message> {
    match msg {
        Message::Text(text) => Some(Message::Text(text)),
        Message::Binary(samples) => Some(UpstreamEvent::audio_append(&samples).into_message()),
        _ => None,
    }
}

/// Upstream frames reach the relay with their original framing.
pub fn translate_outbound(msg: Message) -> Option<Message> {
    match msg {
        Message::Text(_) | Message::Binary(_) => Some(msg),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use serde_json::Value;

    #[test]
    fn test_binary_frame_becomes_audio_envelope() {
        let out = translate_inbound(Message::Binary(vec![0x01, 0x02, 0x03])).unwrap();
        assert_eq!(
            out,
            Message::Text(r#"{"type":"input_audio_buffer.append","audio":"AQID"}"#.to_string())
        );
    }

    #[test]
    fn test_empty_binary_frame_is_still_forwarded() {
        let out = translate_inbound(Message::Binary(Vec::new())).unwrap();
        assert_eq!(
            out,
            Message::Text(r#"{"type":"input_audio_buffer.append","audio":""}"#.to_string())
        );
    }

    #[test]
    fn test_text_frame_passes_through() {
        let commit = r#"{"type":"input_audio_buffer.commit"}"#.to_string();
        assert_eq!(
            translate_inbound(Message::Text(commit.clone())),
            Some(Message::Text(commit))
        );
        // Not validated as JSON either.
        assert_eq!(
            translate_inbound(Message::Text("hello".into())),
            Some(Message::Text("hello".into()))
        );
    }

    #[test]
    fn test_control_frames_are_dropped() {
        assert_eq!(translate_inbound(Message::Ping(vec![1])), None);
        assert_eq!(translate_inbound(Message::Pong(vec![])), None);
        assert_eq!(translate_outbound(Message::Ping(vec![])), None);
        assert_eq!(translate_outbound(Message::Close(None)), None);
    }

    #[test]
    fn test_outbound_keeps_framing() {
        assert_eq!(
            translate_outbound(Message::Binary(vec![9, 8, 7])),
            Some(Message::Binary(vec![9, 8, 7]))
        );
        assert_eq!(
            translate_outbound(Message::Text("{\"type\":\"response.done\"}".into())),
            Some(Message::Text("{\"type\":\"response.done\"}".into()))
        );
    }

    #[test]
    fn test_session_update_shape() {
        let mut settings = Settings::defaults().unwrap();
        settings.realtime.voice = "verse".into();
        settings.realtime.persona_prompt = "Speak as ".into();
        settings.realtime.agent_name = "Juniper".into();

        let msg = UpstreamEvent::session_update(&settings.realtime).into_message();
        let Message::Text(text) = msg else {
            panic!("session update must be a text frame");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "session.update");
        assert_eq!(value["session"]["voice"], "verse");
        assert_eq!(value["session"]["instructions"], "Speak as Juniper");
    }
}
