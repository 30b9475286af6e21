use log::warn;
use serde::Deserialize;

/// Message envelope the overlay surface sends to the host. One JSON object
/// per interaction, discriminated by `kind`; there is no version field, so
/// schema changes are breaking.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind")]
pub enum BridgeMessage {
    /// Right-click on a text object: surface-local coordinates plus the
    /// current selection. The host maps the coordinates to screen space
    /// before opening a menu.
    #[serde(rename = "contextmenu", rename_all = "camelCase")]
    ContextMenu {
        text_object_id: String,
        x: f64,
        y: f64,
        #[serde(default)]
        selection: String,
    },
    /// Click on an idle audio icon.
    #[serde(rename = "playAudio", rename_all = "camelCase")]
    PlayAudio {
        text_object_id: String,
        path: String,
        /// true = target-language clip, false = source-language clip.
        #[serde(default)]
        target: bool,
    },
    /// Click on a playing audio icon.
    #[serde(rename = "stopAudio", rename_all = "camelCase")]
    StopAudio {
        #[serde(default)]
        text_object_id: Option<String>,
    },
}

/// Parse one raw surface message. Nothing is assumed well-formed: malformed
/// or unparseable input is logged and dropped.
pub fn parse_message(raw: &str) -> Option<BridgeMessage> {
    match serde_json::from_str(raw) {
        Ok(message) => Some(message),
        Err(err) => {
            warn!("dropping malformed bridge message: {err} ({raw})");
            None
        }
    }
}

/// Targeted host → surface mutations, applied by evaluating a script in the
/// overlay webview instead of re-rendering the whole document.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfacePush {
    /// Audio clip for one side of a text object became ready (or was
    /// invalidated).
    AudioState {
        text_object_id: String,
        target: bool,
        ready: bool,
        path: Option<String>,
    },
    /// Playback started or stopped for one text object's clip.
    Playing {
        text_object_id: String,
        target: bool,
        playing: bool,
    },
}

impl SurfacePush {
    pub fn to_script(&self) -> String {
        match self {
            SurfacePush::AudioState {
                text_object_id,
                target,
                ready,
                path,
            } => format!(
                "(function(){{var i=document.querySelector(\
                 '.audio-icon[data-id={id}][data-target=\"{target}\"]');\
                 if(!i)return;i.dataset.path={path};i.style.display={display};}})();",
                id = selector_string(text_object_id),
                target = target,
                path = js_string(path.as_deref().unwrap_or("")),
                display = if *ready { "''" } else { "'none'" },
            ),
            SurfacePush::Playing {
                text_object_id,
                target,
                playing,
            } => format!(
                "(function(){{var i=document.querySelector(\
                 '.audio-icon[data-id={id}][data-target=\"{target}\"]');\
                 if(!i)return;i.dataset.playing='{playing}';\
                 i.classList.toggle('playing',{playing});}})();",
                id = selector_string(text_object_id),
                target = target,
                playing = playing,
            ),
        }
    }
}

/// Quote a Rust string as a JS string literal. serde_json's encoder already
/// escapes quotes, backslashes and control characters.
fn js_string(raw: &str) -> String {
    serde_json::to_string(raw).unwrap_or_else(|_| "\"\"".to_string())
}

/// Quote an attribute value for the selector literals above. Ids are
/// uuids; quote characters cannot appear in them, but strip any that do
/// rather than let them terminate the literal.
fn selector_string(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '\\'))
        .collect();
    format!("\"{cleaned}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_contextmenu() {
        let message = parse_message(
            r#"{"kind":"contextmenu","textObjectId":"obj-1","x":12.5,"y":40,"selection":"hola"}"#,
        );
        assert_eq!(
            message,
            Some(BridgeMessage::ContextMenu {
                text_object_id: "obj-1".to_string(),
                x: 12.5,
                y: 40.0,
                selection: "hola".to_string(),
            })
        );
    }

    #[test]
    fn parses_play_audio() {
        let message = parse_message(
            r#"{"kind":"playAudio","textObjectId":"obj-1","path":"/tmp/clip.wav","target":true}"#,
        );
        assert_eq!(
            message,
            Some(BridgeMessage::PlayAudio {
                text_object_id: "obj-1".to_string(),
                path: "/tmp/clip.wav".to_string(),
                target: true,
            })
        );
    }

    #[test]
    fn parses_stop_audio_without_id() {
        let message = parse_message(r#"{"kind":"stopAudio"}"#);
        assert_eq!(
            message,
            Some(BridgeMessage::StopAudio {
                text_object_id: None
            })
        );
    }

    #[test]
    fn play_audio_without_text_object_id_is_dropped() {
        // Missing required field: not a valid request, no state push owed.
        assert_eq!(
            parse_message(r#"{"kind":"playAudio","path":"/tmp/clip.wav"}"#),
            None
        );
    }

    #[test]
    fn unknown_kind_is_dropped() {
        assert_eq!(parse_message(r#"{"kind":"selfDestruct"}"#), None);
    }

    #[test]
    fn non_json_is_dropped() {
        assert_eq!(parse_message("]not json["), None);
    }

    #[test]
    fn missing_kind_is_dropped() {
        assert_eq!(parse_message(r#"{"textObjectId":"obj-1"}"#), None);
    }

    #[test]
    fn audio_state_script_targets_the_right_icon() {
        let script = SurfacePush::AudioState {
            text_object_id: "obj-1".to_string(),
            target: true,
            ready: true,
            path: Some("/tmp/clip.wav".to_string()),
        }
        .to_script();

        assert!(script.contains("\"obj-1\""));
        assert!(script.contains("data-target=\"true\""));
        assert!(script.contains("\"/tmp/clip.wav\""));
    }

    #[test]
    fn playing_script_toggles_class() {
        let script = SurfacePush::Playing {
            text_object_id: "obj-1".to_string(),
            target: false,
            playing: false,
        }
        .to_script();

        assert!(script.contains("dataset.playing='false'"));
        assert!(script.contains("classList.toggle('playing',false)"));
    }
}
