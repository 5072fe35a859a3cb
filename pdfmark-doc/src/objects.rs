//! Small helpers over lopdf's object model.

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use pdfmark_core::{ObjRef, PageBox, RawValue, Rotation};
use tracing::warn;

/// Reference chains longer than this are treated as broken.
const MAX_INDIRECTION: usize = 32;

pub(crate) fn to_ref(id: ObjectId) -> ObjRef {
    ObjRef::from(id)
}

pub(crate) fn to_id(reference: ObjRef) -> ObjectId {
    reference.as_pair()
}

/// Follows references until a direct object is reached. A dangling
/// reference is logged and reads as absent.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    let mut current = obj;
    for _ in 0..MAX_INDIRECTION {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => {
                    warn!(reference = ?id, "dangling reference");
                    return None;
                }
            },
            other => return Some(other),
        }
    }
    warn!("reference chain too deep");
    None
}

pub(crate) fn entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|obj| resolve(doc, obj))
}

pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

pub(crate) fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

pub(crate) fn numbers(doc: &Document, obj: &Object) -> Option<Vec<f64>> {
    let array = resolve(doc, obj)?.as_array().ok()?;
    Some(
        array
            .iter()
            .filter_map(|item| resolve(doc, item).and_then(number))
            .collect(),
    )
}

pub(crate) fn name<'a>(obj: &'a Object) -> Option<&'a str> {
    obj.as_name().ok().and_then(|raw| std::str::from_utf8(raw).ok())
}

pub(crate) fn name_entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a str> {
    entry(doc, dict, key).and_then(name)
}

/// PDF text strings are either UTF-16BE with a byte order mark or a
/// single-byte encoding; UTF-8 is accepted as well since many writers
/// produce it.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

pub(crate) fn encode_text(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

pub(crate) fn text_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match entry(doc, dict, key)? {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        _ => None,
    }
}

pub(crate) fn to_raw(obj: &Object) -> RawValue {
    match obj {
        Object::Null => RawValue::Null,
        Object::Boolean(b) => RawValue::Boolean(*b),
        Object::Integer(i) => RawValue::Integer(*i),
        Object::Real(f) => RawValue::Real(f64::from(*f)),
        Object::Name(name) => RawValue::Name(name.clone()),
        Object::String(bytes, _) => RawValue::String(bytes.clone()),
        Object::Array(items) => RawValue::Array(items.iter().map(to_raw).collect()),
        Object::Dictionary(dict) => RawValue::Dictionary(
            dict.iter()
                .map(|(key, value)| (key.clone(), to_raw(value)))
                .collect(),
        ),
        Object::Reference(id) => RawValue::Reference(to_ref(*id)),
        Object::Stream(_) => {
            warn!("direct stream cannot be kept, dropped");
            RawValue::Null
        }
    }
}

pub(crate) fn from_raw(raw: &RawValue) -> Object {
    match raw {
        RawValue::Null => Object::Null,
        RawValue::Boolean(b) => Object::Boolean(*b),
        RawValue::Integer(i) => Object::Integer(*i),
        RawValue::Real(f) => real(*f),
        RawValue::Name(name) => Object::Name(name.clone()),
        RawValue::String(bytes) => Object::String(bytes.clone(), StringFormat::Literal),
        RawValue::Array(items) => Object::Array(items.iter().map(from_raw).collect()),
        RawValue::Dictionary(entries) => {
            let mut dict = Dictionary::new();
            for (key, value) in entries {
                dict.set(key.clone(), from_raw(value));
            }
            Object::Dictionary(dict)
        }
        RawValue::Reference(reference) => Object::Reference(to_id(*reference)),
    }
}

/// Looks `key` up on the page and then up the page tree via `/Parent`.
pub(crate) fn resolve_inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut visited = HashSet::new();
    let mut current = page_id;
    while visited.insert(current) {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

/// Crop box, or media box when there is none, plus the page rotation.
pub(crate) fn page_box(doc: &Document, page_id: ObjectId) -> Option<PageBox> {
    let raw = resolve_inherited(doc, page_id, b"CropBox")
        .or_else(|| resolve_inherited(doc, page_id, b"MediaBox"))?;
    let corners = numbers(doc, raw)?;
    if corners.len() < 4 {
        warn!(page = ?page_id, "malformed page box");
        return None;
    }
    let rotation = resolve_inherited(doc, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .map(Rotation::from_degrees)
        .unwrap_or_default();
    Some(PageBox::new(corners[0], corners[1], corners[2], corners[3]).with_rotation(rotation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn text_round_trips_through_both_encodings() {
        for text in ["Chapter 1", "Überblick – Teil 2"] {
            match encode_text(text) {
                Object::String(bytes, _) => assert_eq!(decode_text(&bytes), text),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(decode_text(&[0x43, 0xE9]), "Cé");
    }

    #[test]
    fn page_box_is_inherited_and_prefers_crop_box() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let plain = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        let cropped = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "CropBox" => vec![10.into(), 20.into(), 310.into(), 420.into()],
            "Rotate" => -90,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![plain.into(), cropped.into()],
                "Count" => 2,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );

        let inherited = page_box(&doc, plain).unwrap();
        assert_eq!((inherited.width(), inherited.height()), (612.0, 792.0));
        assert_eq!(inherited.rotation, Rotation::None);

        let crop = page_box(&doc, cropped).unwrap();
        assert_eq!((crop.x0, crop.y0, crop.x1, crop.y1), (10.0, 20.0, 310.0, 420.0));
        assert_eq!(crop.rotation, Rotation::ThreeQuarters);
    }

    #[test]
    fn raw_values_keep_actions_intact() {
        let action = Object::Dictionary(dictionary! {
            "S" => "URI",
            "URI" => Object::string_literal("https://example.org/a"),
            "Next" => Object::Reference((12, 0)),
            "IsMap" => false,
        });
        let back = from_raw(&to_raw(&action));
        let dict = back.as_dict().unwrap();
        assert_eq!(name(dict.get(b"S").unwrap()), Some("URI"));
        assert!(matches!(
            dict.get(b"URI").unwrap(),
            Object::String(bytes, _) if bytes.as_slice() == b"https://example.org/a"
        ));
        assert_eq!(dict.get(b"Next").unwrap().as_reference().unwrap(), (12, 0));
        assert!(matches!(dict.get(b"IsMap").unwrap(), Object::Boolean(false)));
    }

    #[test]
    fn dangling_reference_reads_as_absent() {
        let doc = Document::with_version("1.5");
        assert!(resolve(&doc, &Object::Reference((99, 0))).is_none());
        assert_eq!(number(&Object::Real(1.5)), Some(1.5));
    }
}
