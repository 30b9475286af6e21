use serde::{Deserialize, Serialize};

use crate::logic::{Orientation, TextObject};

/// Which text-object field the overlay shows, and whether it shows anything
/// at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayMode {
    Hide,
    Source,
    Translated,
}

impl Default for OverlayMode {
    fn default() -> Self {
        OverlayMode::Translated
    }
}

/// User-configurable presentation of the overlay boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayStyle {
    /// CSS color override for text; `None` keeps the default.
    pub text_color: Option<String>,
    pub background_color: Option<String>,
    pub opacity: f64,
    pub font_family: String,
    pub font_weight: u16,
    pub border_radius: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            text_color: None,
            background_color: None,
            opacity: 0.9,
            font_family: "sans-serif".to_string(),
            font_weight: 400,
            border_radius: 4.0,
        }
    }
}

/// Languages whose text may be laid out vertically. Everything else
/// downgrades vertical regions to horizontal.
const VERTICAL_CAPABLE_LANGUAGES: &[&str] = &["ja", "zh", "ko"];

pub fn language_supports_vertical(language: &str) -> bool {
    let primary = language.split(['-', '_']).next().unwrap_or(language);
    VERTICAL_CAPABLE_LANGUAGES.contains(&primary)
}

/// Render the overlay document for the current object set.
///
/// Deterministic: equal inputs yield byte-identical output, so the caller
/// can compare against the previously rendered string and skip the surface
/// update entirely. That comparison is the backpressure against redundant
/// surface churn on every tick.
pub fn render(
    objects: &[TextObject],
    mode: OverlayMode,
    style: &OverlayStyle,
    interactive: bool,
    vertical_capable: bool,
) -> String {
    let mut body = String::new();

    if mode != OverlayMode::Hide {
        for obj in objects {
            body.push_str(&render_object(obj, mode, interactive, vertical_capable));
        }
    }

    let script = if interactive && mode != OverlayMode::Hide {
        INTERACTION_SCRIPT
    } else {
        ""
    };

    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><style>{css}</style></head>\
         <body>{body}{script}</body></html>",
        css = render_css(style, interactive),
        body = body,
        script = script,
    )
}

fn render_object(
    obj: &TextObject,
    mode: OverlayMode,
    interactive: bool,
    vertical_capable: bool,
) -> String {
    let text = match mode {
        OverlayMode::Hide => unreachable!("hidden objects are omitted before this point"),
        OverlayMode::Source => &obj.source_text,
        // Translation may not have arrived yet; show what we have.
        OverlayMode::Translated if obj.translated_text.is_empty() => &obj.source_text,
        OverlayMode::Translated => &obj.translated_text,
    };

    let vertical = obj.orientation == Orientation::Vertical && vertical_capable;
    let writing_mode = if vertical {
        "writing-mode:vertical-rl;"
    } else {
        ""
    };

    let audio = if interactive {
        let (slot, target) = match mode {
            OverlayMode::Source => (&obj.source_audio, false),
            _ => (&obj.target_audio, true),
        };
        // The icon is always present so a later audio-state push can
        // reveal it in place; it stays hidden until the clip is ready.
        let ready = slot.ready && slot.path.is_some();
        format!(
            "<span class=\"audio-icon\" data-id=\"{id}\" data-target=\"{target}\" \
             data-path=\"{path}\" data-playing=\"false\"{hidden}>&#9654;</span>",
            id = escape_attr(&obj.id),
            target = target,
            path = escape_attr(slot.path.as_deref().unwrap_or("")),
            hidden = if ready { "" } else { " style=\"display:none\"" },
        )
    } else {
        String::new()
    };

    format!(
        "<div class=\"text-object\" data-id=\"{id}\" style=\"left:{x}px;top:{y}px;\
         width:{w}px;height:{h}px;{writing_mode}\">\
         <span class=\"text\">{text}</span>{audio}</div>",
        id = escape_attr(&obj.id),
        x = obj.x,
        y = obj.y,
        w = obj.width,
        h = obj.height,
        writing_mode = writing_mode,
        text = escape_text(text),
        audio = audio,
    )
}

fn render_css(style: &OverlayStyle, interactive: bool) -> String {
    let text_color = style.text_color.as_deref().unwrap_or("#ffffff");
    let background = style.background_color.as_deref().unwrap_or("#000000");
    // Click-through surfaces must not swallow pointer events.
    let pointer_events = if interactive { "auto" } else { "none" };

    format!(
        "html,body{{margin:0;background:transparent;pointer-events:{pointer_events};}}\
         .text-object{{position:absolute;overflow:hidden;box-sizing:border-box;\
         color:{text_color};background:{background};opacity:{opacity};\
         font-family:{font_family};font-weight:{font_weight};\
         border-radius:{border_radius}px;}}\
         .audio-icon{{cursor:pointer;margin-left:4px;user-select:none;}}\
         .audio-icon.playing{{color:#4caf50;}}",
        pointer_events = pointer_events,
        text_color = escape_text(text_color),
        background = escape_text(background),
        opacity = style.opacity,
        font_family = escape_text(&style.font_family),
        font_weight = style.font_weight,
        border_radius = style.border_radius,
    )
}

/// Wires the surface's interactions into the bridge: every message is one
/// JSON envelope with a `kind` field.
const INTERACTION_SCRIPT: &str = "<script>\
(function(){\
function post(msg){window.ipc.postMessage(JSON.stringify(msg));}\
document.addEventListener('contextmenu',function(e){\
var obj=e.target.closest('.text-object');if(!obj)return;\
e.preventDefault();\
post({kind:'contextmenu',textObjectId:obj.dataset.id,x:e.clientX,y:e.clientY,\
selection:String(window.getSelection())});});\
document.addEventListener('click',function(e){\
var icon=e.target.closest('.audio-icon');if(!icon)return;\
if(icon.dataset.playing==='true'){\
post({kind:'stopAudio',textObjectId:icon.dataset.id});\
}else{\
post({kind:'playAudio',textObjectId:icon.dataset.id,path:icon.dataset.path,\
target:icon.dataset.target==='true'});}});\
})();\
</script>";

fn escape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

fn escape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::AudioState;

    fn object(source: &str, translated: &str) -> TextObject {
        TextObject {
            id: "obj-1".to_string(),
            source_text: source.to_string(),
            translated_text: translated.to_string(),
            x: 10.0,
            y: 20.0,
            width: 120.0,
            height: 24.0,
            orientation: Orientation::Horizontal,
            source_audio: AudioState::default(),
            target_audio: AudioState::default(),
        }
    }

    fn style() -> OverlayStyle {
        OverlayStyle::default()
    }

    #[test]
    fn render_is_deterministic() {
        let objects = vec![object("こんにちは", "hello"), object("世界", "world")];
        let a = render(&objects, OverlayMode::Translated, &style(), true, true);
        let b = render(&objects, OverlayMode::Translated, &style(), true, true);
        assert_eq!(a, b);
    }

    #[test]
    fn hide_mode_omits_objects_and_script() {
        let objects = vec![object("text", "translated")];
        let doc = render(&objects, OverlayMode::Hide, &style(), true, true);
        assert!(!doc.contains("text-object\" data-id"));
        assert!(!doc.contains("<script>"));
    }

    #[test]
    fn element_order_matches_input_order_across_modes() {
        let mut first = object("a", "A");
        first.id = "first".to_string();
        let mut second = object("b", "B");
        second.id = "second".to_string();
        let objects = vec![first, second];

        let doc = render(&objects, OverlayMode::Translated, &style(), true, true);
        let first_pos = doc.find("data-id=\"first\"").unwrap();
        let second_pos = doc.find("data-id=\"second\"").unwrap();
        assert!(first_pos < second_pos);
    }

    #[test]
    fn translated_mode_falls_back_to_source_text() {
        let objects = vec![object("原文", "")];
        let doc = render(&objects, OverlayMode::Translated, &style(), false, true);
        assert!(doc.contains("原文"));
    }

    #[test]
    fn source_mode_shows_source_text() {
        let objects = vec![object("原文", "translated")];
        let doc = render(&objects, OverlayMode::Source, &style(), false, true);
        assert!(doc.contains("原文"));
        assert!(!doc.contains("translated</span>"));
    }

    #[test]
    fn recognized_text_is_escaped() {
        let objects = vec![object("<b>bold & brash</b>", "")];
        let doc = render(&objects, OverlayMode::Source, &style(), false, true);
        assert!(doc.contains("&lt;b&gt;bold &amp; brash&lt;/b&gt;"));
        assert!(!doc.contains("<b>bold"));
    }

    #[test]
    fn non_interactive_document_has_no_affordances() {
        let mut obj = object("text", "translated");
        obj.target_audio = AudioState {
            ready: true,
            path: Some("/tmp/clip.wav".to_string()),
        };
        let doc = render(&[obj], OverlayMode::Translated, &style(), false, true);
        assert!(!doc.contains("<script>"));
        assert!(!doc.contains("audio-icon\" data-id"));
        assert!(doc.contains("pointer-events:none"));
    }

    #[test]
    fn interactive_document_emits_audio_icon_when_ready() {
        let mut obj = object("text", "translated");
        obj.target_audio = AudioState {
            ready: true,
            path: Some("/tmp/clip.wav".to_string()),
        };
        let doc = render(&[obj], OverlayMode::Translated, &style(), true, true);
        assert!(doc.contains("audio-icon"));
        assert!(doc.contains("data-path=\"/tmp/clip.wav\""));
        assert!(doc.contains("<script>"));
    }

    #[test]
    fn audio_icon_stays_hidden_until_clip_is_ready() {
        let obj = object("text", "translated");
        let doc = render(&[obj], OverlayMode::Translated, &style(), true, true);
        assert!(doc.contains("audio-icon"));
        assert!(doc.contains("style=\"display:none\""));
    }

    #[test]
    fn vertical_downgrades_without_capable_language() {
        let mut obj = object("縦書き", "");
        obj.orientation = Orientation::Vertical;

        let vertical = render(
            std::slice::from_ref(&obj),
            OverlayMode::Source,
            &style(),
            false,
            true,
        );
        let horizontal = render(
            std::slice::from_ref(&obj),
            OverlayMode::Source,
            &style(),
            false,
            false,
        );

        assert!(vertical.contains("writing-mode:vertical-rl"));
        assert!(!horizontal.contains("writing-mode"));
    }

    #[test]
    fn vertical_capable_language_detection() {
        assert!(language_supports_vertical("ja"));
        assert!(language_supports_vertical("zh-TW"));
        assert!(!language_supports_vertical("en"));
        assert!(!language_supports_vertical("de-DE"));
    }
}
