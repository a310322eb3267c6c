//! Companion-pair merges through sessions

use crate::common::{create_model_container, model_pair, temp_dir};
use pretty_assertions::assert_eq;
use spiral_archive::srd::resource_records;
use spiral_archive::{
    CompanionRole, ContainerKind, Error, FirstCandidate, PatchSession, PatchStrategy, Preselected,
    Selection,
};
use std::fs;

fn locations(structural: &[u8]) -> Vec<(String, Vec<(u32, u32)>)> {
    resource_records(structural)
        .unwrap()
        .into_iter()
        .map(|record| {
            let locations = record
                .locations
                .iter()
                .map(|l| (l.offset, l.length))
                .collect();
            (record.name, locations)
        })
        .collect()
}

#[test]
fn test_companion_roundtrip() {
    let dir = temp_dir();
    for kind in ContainerKind::ALL {
        let path = create_model_container(dir.path(), kind, false);
        let (original_structural, _) = model_pair();
        let mut session = PatchSession::open(&path).unwrap();

        let texture = vec![b'X'; 20];
        let outcome = session
            .merge("face.tex", &texture, &mut FirstCandidate)
            .unwrap();
        assert_ne!(outcome.plan.strategy, PatchStrategy::InPlace);

        let container = session.container();
        let structural = container.read_entry("stand_00.srd").unwrap();
        let bulk = container.read_entry("stand_00.srdv").unwrap();
        assert_eq!(structural.len(), original_structural.len());

        let table = locations(&structural);
        assert_eq!(
            table,
            vec![
                ("skin.tex".to_string(), vec![(0, 16)]),
                ("face.tex".to_string(), vec![(16, 20), (52, 8)]),
                ("hair.tex".to_string(), vec![(36, 16)]),
            ],
            "{kind}"
        );

        // Every resource reads back through its rewritten location
        let slice = |offset: u32, length: u32| &bulk[offset as usize..(offset + length) as usize];
        assert_eq!(slice(0, 16), &[b'S'; 16][..]);
        assert_eq!(slice(16, 20), &texture[..]);
        assert_eq!(slice(36, 16), &[b'H'; 16][..]);
        assert_eq!(slice(52, 8), &[b'f'; 8][..]);

        assert_eq!(container.read_entry("readme.txt").unwrap(), b"model pack");
    }
}

#[test]
fn test_same_size_merge_is_in_place() {
    let dir = temp_dir();
    let path = create_model_container(dir.path(), ContainerKind::Spc, false);
    let mut session = PatchSession::open(&path).unwrap();

    let outcome = session
        .merge("hair.tex", &[b'h'; 16], &mut FirstCandidate)
        .unwrap();
    assert_eq!(outcome.plan.strategy, PatchStrategy::InPlace);

    let bulk = session.container().read_entry("stand_00.srdv").unwrap();
    assert_eq!(&bulk[24..40], &[b'h'; 16][..]);
}

#[test]
fn test_cancelled_selection_leaves_target_untouched() {
    let dir = temp_dir();
    let path = create_model_container(dir.path(), ContainerKind::Wad, true);
    let before = fs::read(&path).unwrap();
    let mut session = PatchSession::open(&path).unwrap();

    let mut asked = Vec::new();
    let mut cancel = |role: CompanionRole, candidates: &[String]| {
        asked.push((role, candidates.to_vec()));
        Selection::Cancelled
    };
    let err = session.merge("face.tex", b"new", &mut cancel).unwrap_err();

    assert!(matches!(err, Error::SelectionCancelled));
    assert!(err.is_recoverable());
    assert_eq!(
        asked,
        vec![(
            CompanionRole::Structural,
            vec!["stand_00.srd".to_string(), "stand_01.srd".to_string()]
        )]
    );
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_disambiguated_pair_is_patched() {
    let dir = temp_dir();
    let path = create_model_container(dir.path(), ContainerKind::Zip, true);
    let mut session = PatchSession::open(&path).unwrap();

    let mut chooser = Preselected {
        structural: Some("stand_01.srd".to_string()),
        bulk: Some("stand_01.srdv".to_string()),
    };
    session.merge("skin.tex", b"tiny", &mut chooser).unwrap();

    let container = session.container();
    let (_, original_bulk) = model_pair();
    assert_eq!(container.read_entry("stand_00.srdv").unwrap(), original_bulk);
    let patched = container.read_entry("stand_01.srdv").unwrap();
    assert_eq!(patched.len(), original_bulk.len() - 12);
    assert_eq!(&patched[..4], b"tiny");
}

#[test]
fn test_invalid_selection_and_missing_resource() {
    let dir = temp_dir();
    let path = create_model_container(dir.path(), ContainerKind::Spc, true);
    let before = fs::read(&path).unwrap();
    let mut session = PatchSession::open(&path).unwrap();

    let mut wrong = Preselected {
        structural: Some("stand_99.srd".to_string()),
        bulk: None,
    };
    assert!(matches!(
        session.merge("face.tex", b"x", &mut wrong),
        Err(Error::InvalidSelection(name)) if name == "stand_99.srd"
    ));
    assert!(matches!(
        session.merge("tail.tex", b"x", &mut FirstCandidate),
        Err(Error::ResourceNotFound(_))
    ));
    assert_eq!(fs::read(&path).unwrap(), before);
}
