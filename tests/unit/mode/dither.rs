use super::*;

#[test]
fn named_values_match_the_published_words() {
    assert_eq!(DitherMode::FASTEST.0, 0);
    assert_eq!(DitherMode::GOOD.0, 0x0000_FF55);
    assert_eq!(DitherMode::BEST_DIFFUSED.0, 0x0000_04FF);
    assert_eq!(DitherMode::BETTER_PHOTO.0, 0x0001_00AA);
    assert_eq!(DitherMode::NONE.0, 0xFF00_0000);
    assert_eq!(DitherMode::ORDERED_2X2_4X4.0, 0xFF00_0014);
}

#[test]
fn vendor_byte_disambiguates_the_two_encodings() {
    // Same low bits, different namespaces.
    assert_eq!(
        DitherMode(0x0000_0004).decode().unwrap(),
        DitherDesc::Implicit {
            image_type: ImageType::Unknown,
            technique: DitherTechnique::DontCare,
            quality: 4,
        }
    );
    assert_eq!(
        DitherMode(0xFF00_0004).decode().unwrap(),
        DitherDesc::Explicit {
            matrix: DitherMatrix::Ordered2x2,
        }
    );
}

#[test]
fn decode_then_encode_is_identity() {
    let named = [
        DitherMode::FASTEST,
        DitherMode::FASTEST_ON,
        DitherMode::FASTEST_RANDOM,
        DitherMode::FASTEST_ORDERED,
        DitherMode::FASTEST_DIFFUSED,
        DitherMode::FASTEST_PHOTO,
        DitherMode::FASTEST_DRAWING,
        DitherMode::GOOD,
        DitherMode::GOOD_RANDOM,
        DitherMode::GOOD_ORDERED,
        DitherMode::GOOD_DIFFUSED,
        DitherMode::GOOD_PHOTO,
        DitherMode::GOOD_DRAWING,
        DitherMode::BETTER,
        DitherMode::BETTER_RANDOM,
        DitherMode::BETTER_ORDERED,
        DitherMode::BETTER_DIFFUSED,
        DitherMode::BETTER_PHOTO,
        DitherMode::BETTER_DRAWING,
        DitherMode::BEST,
        DitherMode::BEST_RANDOM,
        DitherMode::BEST_ORDERED,
        DitherMode::BEST_DIFFUSED,
        DitherMode::BEST_PHOTO,
        DitherMode::BEST_DRAWING,
        DitherMode::NONE,
        DitherMode::ORDERED_2X2,
        DitherMode::ORDERED_4X4,
        DitherMode::ORDERED_2X2_4X4,
    ];
    for mode in named {
        assert_eq!(mode.decode().unwrap().encode(), mode, "{:#x}", mode.0);
    }
}

#[test]
fn invalid_words_are_rejected() {
    for raw in [
        0x0100_0000u32,
        0x0004_0000,
        0x0003_0000,
        0x0000_0300,
        0xFF00_0001,
        0xFF00_0010 | 0x100,
    ] {
        let err = DitherMode(raw).decode().unwrap_err();
        assert_eq!(err.code(), ErrorCode::DitherMode, "{raw:#x}");
    }
}

#[test]
fn resolve_picks_concrete_techniques() {
    let r = |m: DitherMode| m.decode().unwrap().resolve();
    assert_eq!(r(DitherMode::FASTEST), ResolvedDither::None);
    assert_eq!(
        r(DitherMode::FASTEST_ON),
        ResolvedDither::Ordered(DitherMatrix::Ordered4x4)
    );
    assert_eq!(
        r(DitherMode::GOOD_PHOTO),
        ResolvedDither::Ordered(DitherMatrix::Ordered4x4)
    );
    assert_eq!(r(DitherMode::BEST_RANDOM), ResolvedDither::Random);
    assert_eq!(r(DitherMode::BEST_DIFFUSED), ResolvedDither::Diffused);
    assert_eq!(r(DitherMode::NONE), ResolvedDither::None);
    assert_eq!(
        r(DitherMode::ORDERED_2X2),
        ResolvedDither::Ordered(DitherMatrix::Ordered2x2)
    );
}

#[test]
fn resolved_modes_reencode() {
    assert_eq!(
        ResolvedDither::Ordered(DitherMatrix::Ordered4x4).mode(),
        DitherMode::ORDERED_4X4
    );
    assert_eq!(ResolvedDither::None.mode(), DitherMode::NONE);
    assert_eq!(ResolvedDither::Random.mode(), DitherMode::FASTEST_RANDOM);
}
