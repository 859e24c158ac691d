// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Process-wide font registry.
//!
//! Registration is expected to happen single-threaded at startup; afterwards
//! the tables are read-only and lookups take a shared lock. Sized face data
//! lives in a per-thread cache (see [`super::cache`]).

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use peniko::Blob;
use smallvec::SmallVec;
use swash::text::Script;
use tracing::warn;

use super::cache;
use super::{
    FaceCreateInfo, FamilyCreateInfo, Font, FontData, FontFace, FontFamily, FontStyle, FontWeight,
    RegistryError, SingleScriptFont,
};

struct FaceRecord {
    #[allow(dead_code)]
    name: String,
    blob: Blob<u8>,
}

#[derive(Default)]
struct FamilyRecord {
    lookup: [[Option<FontFace>; FontStyle::COUNT]; FontWeight::COUNT],
    linked: SmallVec<[FontFamily; 2]>,
    fallback: SmallVec<[FontFamily; 4]>,
    scripts: Vec<Script>,
    covers_all_scripts: bool,
    initialized: bool,
}

impl FamilyRecord {
    fn face(&self, weight: FontWeight, style: FontStyle) -> Option<FontFace> {
        self.lookup[weight as usize][style as usize]
    }

    fn has_script(&self, script: Script) -> bool {
        self.covers_all_scripts || self.scripts.contains(&script)
    }
}

#[derive(Default)]
struct RegistryData {
    faces: Vec<FaceRecord>,
    faces_by_name: HashMap<String, FontFace>,
    families: Vec<FamilyRecord>,
    families_by_name: HashMap<String, FontFamily>,
}

impl RegistryData {
    fn get_or_add_family(&mut self, name: &str) -> FontFamily {
        if let Some(&family) = self.families_by_name.get(name) {
            return family;
        }
        let family = FontFamily(self.families.len() as u32);
        self.families_by_name.insert(name.to_owned(), family);
        self.families.push(FamilyRecord::default());
        family
    }

    fn get_or_add_face(&mut self, info: &FaceCreateInfo) -> FontFace {
        if let Some(&face) = self.faces_by_name.get(&info.name) {
            return face;
        }
        let face = FontFace(self.faces.len() as u32);
        self.faces_by_name.insert(info.name.clone(), face);
        self.faces.push(FaceRecord {
            name: info.name.clone(),
            blob: info.data.clone(),
        });
        face
    }

    /// Resolves the face for `script`: the family's own face if it covers
    /// the script, else the first initialized linked family that does, else
    /// the family's face regardless.
    fn face_for_script(
        &self,
        family: FontFamily,
        weight: FontWeight,
        style: FontStyle,
        script: Script,
    ) -> Option<FontFace> {
        let record = &self.families[family.0 as usize];
        if !record.has_script(script) {
            for &linked in &record.linked {
                let linked_record = &self.families[linked.0 as usize];
                if linked_record.initialized && linked_record.has_script(script) {
                    return linked_record.face(weight, style);
                }
            }
        }
        record.face(weight, style)
    }

    /// The first face able to draw `codepoint`: the base face, else the
    /// matching face of each fallback family in order. Returns the face and
    /// its sized data so the caller can keep probing coverage.
    fn find_compatible_font(
        &self,
        font: Font,
        codepoint: char,
        base_face: Option<FontFace>,
        fallback: &[FontFamily],
    ) -> Option<(FontFace, FontData)> {
        if let Some(base) = base_face {
            if let Some(data) = self.font_data(base, font.size) {
                if data.has_codepoint(codepoint) {
                    return Some((base, data));
                }
            }
        }
        for &family in fallback {
            let record = &self.families[family.0 as usize];
            if !record.initialized {
                continue;
            }
            let Some(face) = record.face(font.weight, font.style) else {
                continue;
            };
            let Some(data) = self.font_data(face, font.size) else {
                continue;
            };
            if data.has_codepoint(codepoint) {
                return Some((face, data));
            }
        }
        None
    }

    fn font_data(&self, face: FontFace, size: u32) -> Option<FontData> {
        let record = self.faces.get(face.0 as usize)?;
        cache::get_or_create(face.0, &record.blob, size)
    }
}

fn registry() -> &'static RwLock<RegistryData> {
    static REGISTRY: OnceLock<RwLock<RegistryData>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(RegistryData::default()))
}

/// Registers a family and loads its faces.
///
/// Re-registering an initialized family fails with `AlreadyLoaded`. A
/// registration without faces reverts the family to its uninitialized state
/// and fails with `NoFaces`. Linked and fallback lists may name families
/// that are registered later; they are skipped during resolution until
/// initialized.
pub fn register_family(info: &FamilyCreateInfo) -> Result<FontFamily, RegistryError> {
    let mut data = registry().write().unwrap();
    let family = data.get_or_add_family(&info.name);
    if data.families[family.0 as usize].initialized {
        return Err(RegistryError::AlreadyLoaded);
    }

    {
        let record = &mut data.families[family.0 as usize];
        record.covers_all_scripts = info.scripts.is_empty();
        record.scripts = info.scripts.clone();
    }

    let linked: SmallVec<[FontFamily; 2]> = info
        .linked_families
        .iter()
        .map(|name| data.get_or_add_family(name))
        .collect();
    let fallback: SmallVec<[FontFamily; 4]> = info
        .fallback_families
        .iter()
        .map(|name| data.get_or_add_family(name))
        .collect();
    {
        let record = &mut data.families[family.0 as usize];
        record.linked = linked;
        record.fallback = fallback;
    }

    if info.faces.is_empty() {
        let record = &mut data.families[family.0 as usize];
        record.scripts.clear();
        record.covers_all_scripts = false;
        record.linked.clear();
        record.fallback.clear();
        return Err(RegistryError::NoFaces);
    }

    let mut default_face: Option<FontFace> = None;
    for face_info in &info.faces {
        let face = data.get_or_add_face(face_info);
        data.families[family.0 as usize].lookup[face_info.weight as usize]
            [face_info.style as usize] = Some(face);
        if face_info.weight == FontWeight::Regular && face_info.style == FontStyle::Normal {
            default_face = Some(face);
        } else if default_face.is_none() {
            default_face = Some(face);
        }
    }

    let record = &mut data.families[family.0 as usize];
    for weight in 0..FontWeight::COUNT {
        for style in 0..FontStyle::COUNT {
            if record.lookup[weight][style].is_none() {
                record.lookup[weight][style] = default_face;
            }
        }
    }
    record.initialized = true;
    Ok(family)
}

pub fn get_family(name: &str) -> Option<FontFamily> {
    registry().read().unwrap().families_by_name.get(name).copied()
}

/// The face a query resolves to, ignoring script coverage. The family must
/// be initialized.
pub fn get_face(font: Font) -> FontFace {
    let data = registry().read().unwrap();
    let record = &data.families[font.family.0 as usize];
    assert!(record.initialized, "font family is not initialized");
    record
        .face(font.weight, font.style)
        .expect("initialized family has a face in every cell")
}

/// Sized data for a face on the calling thread. `None` when the face's blob
/// cannot be parsed; the caller treats such a face as having no glyphs.
pub fn get_font_data(face: FontFace, size: u32) -> Option<FontData> {
    let data = registry().read().unwrap();
    let result = data.font_data(face, size);
    if result.is_none() {
        warn!(face = face.0, "failed to create font data for face");
    }
    result
}

/// Sized data for the face a [`SingleScriptFont`] names.
pub fn get_single_script_font_data(font: SingleScriptFont) -> Option<FontData> {
    get_font_data(font.face, font.size)
}

/// Walks `text[*offset..limit]` and returns the face covering the maximal
/// single-face prefix, advancing `*offset` to the first byte the returned
/// face cannot draw (or to `limit`).
///
/// When no face (base or fallback) can draw any codepoint of the range, the
/// whole range is consumed and the base face is returned; its `.notdef`
/// stands in for every glyph.
pub fn get_sub_font(
    font: Font,
    text: &str,
    offset: &mut usize,
    limit: usize,
    script: Script,
) -> SingleScriptFont {
    let data = registry().read().unwrap();
    let record = &data.families[font.family.0 as usize];
    assert!(record.initialized, "base family must be initialized");

    let base_face = data.face_for_script(font.family, font.weight, font.style, script);
    let fallback = record.fallback.clone();

    let mut iter = text[*offset..limit].char_indices();

    // Find the first font able to render a char from the string.
    let mut target: Option<(FontFace, FontData)> = None;
    for (_, ch) in iter.by_ref() {
        if let Some(found) = data.find_compatible_font(font, ch, base_face, &fallback) {
            target = Some(found);
            break;
        }
    }

    let Some((target_face, target_data)) = target else {
        // Nothing can render this substring; the base face's .notdef will.
        *offset = limit;
        return SingleScriptFont {
            face: base_face.unwrap_or(FontFace(0)),
            size: font.size,
        };
    };

    // See how far the chosen face keeps rendering.
    for (idx, ch) in iter {
        if !target_data.has_codepoint(ch) {
            *offset += idx;
            return SingleScriptFont {
                face: target_face,
                size: font.size,
            };
        }
    }

    *offset = limit;
    SingleScriptFont {
        face: target_face,
        size: font.size,
    }
}
