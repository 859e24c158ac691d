// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use swash::text::Script;

use super::utils::fake_face_data;
use crate::font::{
    registry, FaceCreateInfo, FamilyCreateInfo, Font, FontStyle, FontWeight, RegistryError,
};

fn face(name: &str, weight: FontWeight, style: FontStyle) -> FaceCreateInfo {
    FaceCreateInfo {
        name: name.to_owned(),
        data: fake_face_data(),
        weight,
        style,
    }
}

#[test]
fn register_twice_reports_already_loaded() {
    let info = FamilyCreateInfo {
        name: "RegTwice".to_owned(),
        faces: vec![face("RegTwice-Regular", FontWeight::Regular, FontStyle::Normal)],
        ..Default::default()
    };
    registry::register_family(&info).unwrap();
    assert_eq!(
        registry::register_family(&info),
        Err(RegistryError::AlreadyLoaded)
    );
}

#[test]
fn registration_without_faces_reverts_the_family() {
    let empty = FamilyCreateInfo {
        name: "Faceless".to_owned(),
        scripts: vec![Script::Latin],
        ..Default::default()
    };
    assert_eq!(registry::register_family(&empty), Err(RegistryError::NoFaces));

    // The family can be registered properly afterwards.
    let full = FamilyCreateInfo {
        name: "Faceless".to_owned(),
        faces: vec![face("Faceless-Regular", FontWeight::Regular, FontStyle::Normal)],
        ..Default::default()
    };
    assert!(registry::register_family(&full).is_ok());
}

#[test]
fn lookup_by_name() {
    let family = registry::register_family(&FamilyCreateInfo {
        name: "Lookup".to_owned(),
        faces: vec![face("Lookup-Regular", FontWeight::Regular, FontStyle::Normal)],
        ..Default::default()
    })
    .unwrap();
    assert_eq!(registry::get_family("Lookup"), Some(family));
    assert_eq!(registry::get_family("NoSuchName"), None);
}

#[test]
fn missing_cells_fall_back_to_the_default_face() {
    let family = registry::register_family(&FamilyCreateInfo {
        name: "Sparse".to_owned(),
        faces: vec![
            face("Sparse-Regular", FontWeight::Regular, FontStyle::Normal),
            face("Sparse-Bold", FontWeight::Bold, FontStyle::Normal),
        ],
        ..Default::default()
    })
    .unwrap();

    let regular = registry::get_face(Font::new(family, 16));
    let bold = registry::get_face(
        Font::new(family, 16).with_attributes(FontWeight::Bold, FontStyle::Normal),
    );
    let thin_italic = registry::get_face(
        Font::new(family, 16).with_attributes(FontWeight::Thin, FontStyle::Italic),
    );

    assert_ne!(regular, bold);
    // Unfilled cells resolve to the Regular/Normal default.
    assert_eq!(thin_italic, regular);
}

#[test]
fn faces_are_deduplicated_by_name() {
    let a = registry::register_family(&FamilyCreateInfo {
        name: "DedupA".to_owned(),
        faces: vec![face("Dedup-Shared", FontWeight::Regular, FontStyle::Normal)],
        ..Default::default()
    })
    .unwrap();
    let b = registry::register_family(&FamilyCreateInfo {
        name: "DedupB".to_owned(),
        faces: vec![face("Dedup-Shared", FontWeight::Regular, FontStyle::Normal)],
        ..Default::default()
    })
    .unwrap();

    assert_eq!(
        registry::get_face(Font::new(a, 16)),
        registry::get_face(Font::new(b, 16))
    );
}

#[test]
fn unloadable_faces_yield_one_degenerate_span() {
    // No face data can be parsed, so no glyph coverage exists anywhere:
    // the walk consumes the whole range and hands back the base face.
    let family = registry::register_family(&FamilyCreateInfo {
        name: "Degenerate".to_owned(),
        faces: vec![face("Degenerate-Regular", FontWeight::Regular, FontStyle::Normal)],
        ..Default::default()
    })
    .unwrap();

    let font = Font::new(family, 16);
    let text = "hello";
    let mut offset = 0;
    let sub = registry::get_sub_font(font, text, &mut offset, text.len(), Script::Latin);
    assert_eq!(offset, text.len());
    assert_eq!(sub.face, registry::get_face(font));
    assert_eq!(sub.size, 16);
}

#[test]
fn linked_family_resolves_uncovered_scripts() {
    registry::register_family(&FamilyCreateInfo {
        name: "HebrewLink".to_owned(),
        scripts: vec![Script::Hebrew],
        faces: vec![face("HebrewLink-Regular", FontWeight::Regular, FontStyle::Normal)],
        ..Default::default()
    })
    .unwrap();
    let base = registry::register_family(&FamilyCreateInfo {
        name: "LatinBase".to_owned(),
        scripts: vec![Script::Latin],
        linked_families: vec!["HebrewLink".to_owned()],
        faces: vec![face("LatinBase-Regular", FontWeight::Regular, FontStyle::Normal)],
        ..Default::default()
    })
    .unwrap();

    let font = Font::new(base, 16);
    let linked = registry::get_family("HebrewLink").unwrap();

    // A Hebrew span resolves to the linked family's face even though no
    // face data loads: the degenerate return still names the linked base.
    let text = "אבג";
    let mut offset = 0;
    let sub = registry::get_sub_font(font, text, &mut offset, text.len(), Script::Hebrew);
    assert_eq!(offset, text.len());
    assert_eq!(sub.face, registry::get_face(Font::new(linked, 16)));

    // A Latin span stays on the base family.
    let mut offset = 0;
    let sub = registry::get_sub_font(font, "abc", &mut offset, 3, Script::Latin);
    assert_eq!(sub.face, registry::get_face(font));
}

#[test]
fn get_font_data_fails_cleanly_for_bad_blobs() {
    let family = registry::register_family(&FamilyCreateInfo {
        name: "BadBlob".to_owned(),
        faces: vec![face("BadBlob-Regular", FontWeight::Regular, FontStyle::Normal)],
        ..Default::default()
    })
    .unwrap();
    let face = registry::get_face(Font::new(family, 16));
    assert!(registry::get_font_data(face, 16).is_none());
}
