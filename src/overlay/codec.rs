//! Flat `key=value;...` text record holding a whole [`PanelState`].
//!
//! ```text
//! x=0;y=200;alpha=1;oalpha=1;locked=1;collapsed=1;max=3;opponents=[id|name|R0Y0B0G0|ox|oy,...]
//! ```
//!
//! Free-text fields are percent-escaped for `% | , ; [ ]`. Decoding never
//! fails from the caller's point of view: anything malformed yields
//! [`PanelState::default`].

use crate::overlay::model::{
    clamp_alpha, clamp_max_opponents, Color, ColorFlags, Opponent, OpponentId, PanelState,
    Position, DEFAULT_MAX_OPPONENTS, MAX_ALPHA,
};
use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static FLAGS_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^R([01])Y([01])B([01])G([01])$").expect("valid flags pattern"));

const ESCAPES: [(char, &str); 6] = [
    ('%', "%25"),
    ('|', "%7C"),
    (',', "%2C"),
    (';', "%3B"),
    ('[', "%5B"),
    (']', "%5D"),
];

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match ESCAPES.iter().find(|(reserved, _)| *reserved == c) {
            Some((_, code)) => out.push_str(code),
            None => out.push(c),
        }
    }
    out
}

/// Single pass, so `%257C` decodes to the literal `%7C` rather than `|`.
/// Unknown `%XX` sequences are kept as-is.
pub fn unescape(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match ESCAPES
            .iter()
            .find(|(_, code)| tail.get(..3).is_some_and(|t| t.eq_ignore_ascii_case(code)))
        {
            Some((reserved, _)) => {
                out.push(*reserved);
                rest = &tail[3..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn encode_flags(flags: ColorFlags) -> String {
    let mut token = String::with_capacity(8);
    for color in Color::ALL {
        token.push(color.flag_letter());
        token.push(if flags.is_excluded(color) { '1' } else { '0' });
    }
    token
}

pub fn decode_flags(token: &str) -> Result<ColorFlags> {
    let caps = FLAGS_TOKEN
        .captures(token)
        .ok_or_else(|| anyhow!("malformed color flags token {token:?}"))?;
    let mut flags = ColorFlags::NONE;
    for color in Color::ALL {
        let excluded = caps
            .get(color.index() + 1)
            .is_some_and(|m| m.as_str() == "1");
        flags = flags.with(color, excluded);
    }
    Ok(flags)
}

fn bool_token(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

pub fn encode(state: &PanelState) -> String {
    let opponents = state
        .opponents
        .iter()
        .map(|o| {
            format!(
                "{}|{}|{}|{}|{}",
                escape(o.id.as_str()),
                escape(&o.name),
                encode_flags(o.excluded),
                o.offset.x,
                o.offset.y
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "x={};y={};alpha={};oalpha={};locked={};collapsed={};max={};opponents=[{}]",
        state.control.x,
        state.control.y,
        state.alpha,
        state.opponent_alpha,
        bool_token(state.locked),
        bool_token(state.control_collapsed),
        state.max_opponents,
        opponents
    )
}

/// Decodes `raw`, falling back to the default state on missing or malformed
/// input.
pub fn decode_or_default(raw: Option<&str>) -> PanelState {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return PanelState::default();
    };
    match decode(raw) {
        Ok(state) => state,
        Err(err) => {
            tracing::warn!(error = %err, "discarding malformed overlay state record");
            PanelState::default()
        }
    }
}

/// Strict decode. Keys `x` and `y` are required, unknown keys are ignored,
/// and any value that does not parse rejects the whole record.
pub fn decode(raw: &str) -> Result<PanelState> {
    let mut fields = HashMap::new();
    for segment in raw.trim().split(';').filter(|s| !s.trim().is_empty()) {
        let (key, value) = segment
            .split_once('=')
            .ok_or_else(|| anyhow!("segment without '=': {segment:?}"))?;
        let key = key.trim();
        if key.is_empty() {
            bail!("segment with empty key: {segment:?}");
        }
        fields.insert(key, value.trim());
    }

    let int_field = |key: &str| -> Result<Option<i64>> {
        fields
            .get(key)
            .map(|v| v.parse::<i64>().with_context(|| format!("field {key}={v:?}")))
            .transpose()
    };
    let float_field = |key: &str| -> Result<Option<f32>> {
        fields
            .get(key)
            .map(|v| v.parse::<f32>().with_context(|| format!("field {key}={v:?}")))
            .transpose()
    };
    let bool_field = |key: &str| -> Result<Option<bool>> {
        fields
            .get(key)
            .map(|v| match *v {
                "1" => Ok(true),
                "0" => Ok(false),
                other => Err(anyhow!("field {key}={other:?} is not 0 or 1")),
            })
            .transpose()
    };

    let x = int_field("x")?.ok_or_else(|| anyhow!("missing field x"))?;
    let y = int_field("y")?.ok_or_else(|| anyhow!("missing field y"))?;
    let defaults = PanelState::default();

    let opponents = match fields.get("opponents") {
        Some(list) => decode_opponents(list)?,
        None => Vec::new(),
    };

    Ok(PanelState {
        control: Position::new(to_i32(x, "x")?, to_i32(y, "y")?),
        alpha: clamp_alpha(float_field("alpha")?.unwrap_or(MAX_ALPHA)),
        opponent_alpha: clamp_alpha(float_field("oalpha")?.unwrap_or(MAX_ALPHA)),
        locked: bool_field("locked")?.unwrap_or(defaults.locked),
        control_collapsed: bool_field("collapsed")?.unwrap_or(defaults.control_collapsed),
        max_opponents: clamp_max_opponents(
            int_field("max")?.unwrap_or(DEFAULT_MAX_OPPONENTS as i64),
        ),
        opponents,
    })
}

fn to_i32(value: i64, key: &str) -> Result<i32> {
    i32::try_from(value).with_context(|| format!("field {key}={value} out of range"))
}

fn decode_opponents(list: &str) -> Result<Vec<Opponent>> {
    let inner = list
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| anyhow!("opponent list is not bracketed: {list:?}"))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner.split(',').map(decode_opponent).collect()
}

fn decode_opponent(record: &str) -> Result<Opponent> {
    let parts: Vec<&str> = record.split('|').collect();
    if !(3..=5).contains(&parts.len()) {
        bail!("opponent record has {} fields: {record:?}", parts.len());
    }
    let offset_part = |idx: usize| -> Result<i32> {
        parts
            .get(idx)
            .map(|v| {
                v.trim()
                    .parse::<i32>()
                    .with_context(|| format!("opponent offset {v:?}"))
            })
            .unwrap_or(Ok(0))
    };
    Ok(Opponent {
        id: OpponentId::from(unescape(parts[0])),
        name: unescape(parts[1]),
        excluded: decode_flags(parts[2].trim())?,
        offset: Position::new(offset_part(3)?, offset_part(4)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> PanelState {
        PanelState {
            control: Position::new(120, 360),
            alpha: 0.72,
            opponent_alpha: 0.5,
            locked: false,
            control_collapsed: true,
            max_opponents: 7,
            opponents: vec![
                Opponent {
                    id: OpponentId::from("id|1"),
                    name: "Rival;A,test [%]".to_string(),
                    excluded: ColorFlags::NONE
                        .with(Color::Red, true)
                        .with(Color::Blue, true),
                    offset: Position::new(520, 880),
                },
                Opponent::new(OpponentId::from("plain"), "Opponent 2"),
            ],
        }
    }

    #[test]
    fn encode_then_decode_keeps_every_field() {
        let source = sample_state();
        let decoded = decode(&encode(&source)).expect("decode");
        assert_eq!(decoded, source);
    }

    #[test]
    fn encoded_record_keeps_reserved_characters_out_of_structure() {
        let encoded = encode(&sample_state());
        assert!(encoded.contains("id%7C1|Rival%3BA%2Ctest %5B%25%5D|R1Y0B1G0|520|880"));
        assert_eq!(encoded.matches(';').count(), 7);
    }

    #[test]
    fn escape_roundtrip_handles_escaped_escapes() {
        for raw in ["%7C", "%%", "a|b,c;d[e]f%g", "%257C", ""] {
            assert_eq!(unescape(&escape(raw)), raw);
        }
        assert_eq!(unescape("100%"), "100%");
        assert_eq!(unescape("%zz"), "%zz");
    }

    #[test]
    fn missing_or_blank_input_decodes_to_default() {
        assert_eq!(decode_or_default(None), PanelState::default());
        assert_eq!(decode_or_default(Some("   ")), PanelState::default());
    }

    #[test]
    fn malformed_input_decodes_to_default() {
        let cases = [
            "garbage",
            "x=1",
            "x=1;y=two",
            "x=1;y=2;locked=yes",
            "x=1;y=2;opponents=a|b|R0Y0B0G0",
            "x=1;y=2;opponents=[a|b]",
            "x=1;y=2;opponents=[a|b|R2Y0B0G0]",
            "x=1;y=2;opponents=[a|b|R0Y0B0|1|2]",
            "x=1;y=2;opponents=[a|b|R0Y0B0G0|1|2|3]",
            "x=1;y=2;opponents=[a|b|R0Y0B0G0|left|2]",
            "=1;x=1;y=2",
            "x=99999999999;y=2",
        ];
        for raw in cases {
            assert_eq!(decode_or_default(Some(raw)), PanelState::default(), "{raw}");
        }
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let state = decode_or_default(Some(
            "x=1;y=2;alpha=9.9;oalpha=0.01;locked=1;collapsed=0;max=999;opponents=[]",
        ));
        assert_eq!(state.alpha, 1.0);
        assert_eq!(state.opponent_alpha, 0.2);
        assert_eq!(state.max_opponents, 12);
        assert!(!state.control_collapsed);

        let state = decode_or_default(Some("x=1;y=2;max=0"));
        assert_eq!(state.max_opponents, 1);
    }

    #[test]
    fn optional_fields_fall_back_to_defaults() {
        let state = decode(
            "x=5;y=6;alpha=0.5;locked=0;max=4;opponents=[a|Opponent 1|R0Y1B0G0]",
        )
        .expect("decode");
        assert_eq!(state.control, Position::new(5, 6));
        assert!(state.control_collapsed);
        assert_eq!(state.opponent_alpha, 1.0);
        assert_eq!(state.opponents.len(), 1);
        assert!(state.opponents[0].offset.is_unplaced());
        assert!(state.opponents[0].excluded.is_excluded(Color::Yellow));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let state = decode("x=5;y=6;theme=dark").expect("decode");
        assert_eq!(state.control, Position::new(5, 6));
    }
}
