use super::*;

use Coefficient::{One, OneMinus, Term, Zero};
use Operand::{A1, A2};

fn tuple(mode: BlendMode) -> (Coefficient, Coefficient, Coefficient, Coefficient) {
    let c = mode.decode().unwrap().classic().unwrap();
    (c.k1, c.k2, c.k3, c.k4)
}

#[test]
fn porter_duff_constants_decode_to_documented_tuples() {
    let table = [
        (BlendMode::CLEAR, (Zero, Zero, Zero, Zero)),
        (BlendMode::SRC1, (One, Zero, One, Zero)),
        (BlendMode::SRC2, (Zero, One, Zero, One)),
        (BlendMode::SRC1OVER, (One, OneMinus(A1), One, OneMinus(A1))),
        (BlendMode::SRC2OVER, (OneMinus(A2), One, OneMinus(A2), One)),
        (BlendMode::SRC1IN, (Term(A2), Zero, Term(A2), Zero)),
        (BlendMode::SRC2IN, (Zero, Term(A1), Zero, Term(A1))),
        (BlendMode::SRC1OUT, (OneMinus(A2), Zero, OneMinus(A2), Zero)),
        (BlendMode::SRC2OUT, (Zero, OneMinus(A1), Zero, OneMinus(A1))),
        (BlendMode::SRC1ATOP, (Term(A2), OneMinus(A1), Term(A2), OneMinus(A1))),
        (BlendMode::SRC2ATOP, (OneMinus(A2), Term(A1), OneMinus(A2), Term(A1))),
        (
            BlendMode::XOR,
            (OneMinus(A2), OneMinus(A1), OneMinus(A2), OneMinus(A1)),
        ),
        (BlendMode::PLUS, (One, One, One, One)),
    ];
    for (mode, expected) in table {
        assert_eq!(tuple(mode), expected, "{:#x}", mode.0);
        // Pure: a second decode yields the same tuple.
        assert_eq!(tuple(mode), expected);
    }
}

#[test]
fn zero_word_is_clear_and_c1_has_its_own_code() {
    assert_eq!(BlendMode::CLEAR, BlendMode(0));
    assert_eq!(tuple(BlendMode(0)), (Zero, Zero, Zero, Zero));

    let c1 = Term(Operand::C1);
    let inv_c1 = OneMinus(Operand::C1);
    let raw = BlendMode((0x30 << 18) | (0x33 << 12) | (0x30 << 6) | 0x33);
    assert_eq!(tuple(raw), (c1, inv_c1, c1, inv_c1));
    assert_ne!(raw, BlendMode::CLEAR);
}

#[test]
fn numeric_porter_duff_words_keep_their_values() {
    let table = [
        (0x0000_0000, (Zero, Zero, Zero, Zero)),
        (0x00fc_0fc0, (One, Zero, One, Zero)),
        (0x0003_f03f, (Zero, One, Zero, One)),
        (0x00fc_4fc4, (One, OneMinus(A1), One, OneMinus(A1))),
        (0x0033_f33f, (OneMinus(A2), One, OneMinus(A2), One)),
        (0x000c_00c0, (Term(A2), Zero, Term(A2), Zero)),
        (0x0000_1001, (Zero, Term(A1), Zero, Term(A1))),
        (0x0030_0300, (OneMinus(A2), Zero, OneMinus(A2), Zero)),
        (0x0000_4004, (Zero, OneMinus(A1), Zero, OneMinus(A1))),
        (0x000c_40c4, (Term(A2), OneMinus(A1), Term(A2), OneMinus(A1))),
        (0x0030_1301, (OneMinus(A2), Term(A1), OneMinus(A2), Term(A1))),
        (0x0030_4304, (OneMinus(A2), OneMinus(A1), OneMinus(A2), OneMinus(A1))),
        (0x00ff_ffff, (One, One, One, One)),
    ];
    for (raw, expected) in table {
        assert_eq!(tuple(BlendMode(raw)), expected, "{raw:#010x}");
    }
    assert_eq!(BlendMode::SRC1OVER, BlendMode(0x00fc_4fc4));
    assert_eq!(BlendMode::XOR, BlendMode(0x0030_4304));
}

#[test]
fn min_max_fields_decode() {
    // mm=01 ii=01 nn=00: min(C1, 1-A1)
    let k1 = 0b01_01_00;
    // mm=10 ii=11 nn=10: max(C2, 1-A2)
    let k2 = 0b10_11_10;
    let raw = BlendMode((k1 << 18) | (k2 << 12) | (0x3F << 6) | 0x00);
    let (a, b, c, d) = tuple(raw);
    assert_eq!(a, Coefficient::Min(Operand::C1, A1));
    assert_eq!(b, Coefficient::Max(Operand::C2, A2));
    assert_eq!((c, d), (One, Zero));
}

#[test]
fn decode_then_encode_is_identity() {
    let mut modes = vec![
        BlendMode::CLEAR,
        BlendMode::SRC1,
        BlendMode::SRC2,
        BlendMode::SRC1OVER,
        BlendMode::SRC2OVER,
        BlendMode::SRC1IN,
        BlendMode::SRC2IN,
        BlendMode::SRC1OUT,
        BlendMode::SRC2OUT,
        BlendMode::SRC1ATOP,
        BlendMode::SRC2ATOP,
        BlendMode::XOR,
        BlendMode::PLUS,
        BlendMode::SRC1OVER.with(BlendMode::REMOTE),
        BlendMode::SRC1OVER.with(BlendMode::GLOBAL_F32),
        BlendMode::XOR.with(BlendMode::REMOTE | BlendMode::GLOBAL_U16),
        BlendMode::PHOENIX.with(BlendMode::GLOBAL_U8),
    ];
    modes.extend((0..23).map(|id| BlendMode((1 << 28) | id)));
    for mode in modes {
        assert_eq!(mode.decode().unwrap().encode(), mode, "{:#x}", mode.0);
    }
}

#[test]
fn every_legal_k_field_round_trips() {
    let mut legal = 0;
    for field in 0u32..64 {
        let raw = BlendMode(field << 18);
        if let Ok(desc) = raw.decode() {
            legal += 1;
            assert_eq!(desc.encode(), raw);
        } else {
            assert_eq!(raw.decode().unwrap_err().code(), ErrorCode::Blend);
        }
    }
    // 4 terms + 4 one-minus + 16 min + 16 max + zero + one; 0x34 and the like are reserved
    assert_eq!(legal, 42);
}

#[test]
fn modifiers_decode() {
    let desc = BlendMode::SRC1OVER
        .with(BlendMode::REMOTE | BlendMode::GLOBAL_U32)
        .decode()
        .unwrap();
    assert!(desc.remote_alpha);
    assert_eq!(desc.global_alpha, GlobalAlphaWidth::U32);
}

#[test]
fn reserved_patterns_are_rejected() {
    assert!(BlendMode(5 << 24).decode().is_err());
    assert!(BlendMode(7 << 24).decode().is_err());
    assert!(BlendMode(2 << 28).decode().is_err());
    assert!(BlendMode((1 << 28) | 23).decode().is_err());
    // mm=00 with both ii and nn set
    assert!(BlendMode(0b00_01_01 << 18).decode().is_err());
    assert!(BlendMode(0x0F << 12).decode().is_err());
    // mm=11 with nn != 0
    assert!(BlendMode(0b11_00_01 << 6).decode().is_err());
}

#[test]
fn aliases_share_ids() {
    assert_eq!(BlendMode::LINEAR_DODGE, BlendMode::ADD);
    assert_eq!(BlendMode::LINEAR_BURN, BlendMode::SUBTRACT);
    assert_eq!(
        BlendMode::GLOW.decode().unwrap().kind,
        BlendKind::Essential {
            mode: EssentialBlend::Glow
        }
    );
}

#[test]
fn source_over_equation_matches_closed_form() {
    let eq = BlendMode::SRC1OVER.decode().unwrap().classic().unwrap();
    let c1 = [0.25, 0.1, 0.0, 0.5];
    let c2 = [0.8, 0.6, 0.4, 1.0];
    let out = eq.apply(c1, c2);
    for ch in 0..4 {
        let expected = c1[ch] + c2[ch] * (1.0 - c1[3]);
        assert!((out[ch] - expected).abs() < 1e-6, "channel {ch}");
    }
}

#[test]
fn alpha_equation_reads_color_terms_as_alpha() {
    // K3 = C2 in the alpha equation means A2.
    let eq = ClassicBlend {
        k1: Zero,
        k2: Zero,
        k3: Term(Operand::C2),
        k4: Zero,
    };
    let out = eq.apply([0.0, 0.0, 0.0, 1.0], [0.1, 0.1, 0.1, 0.5]);
    assert!((out[3] - 0.5).abs() < 1e-6);
}

#[test]
fn essential_normal_equals_source_over() {
    let top = [0.3, 0.2, 0.1, 0.6];
    let back = [0.5, 0.5, 0.5, 1.0];
    let out = EssentialBlend::Normal.apply(top, back);
    let over = BlendMode::SRC1OVER
        .decode()
        .unwrap()
        .classic()
        .unwrap()
        .apply(top, back);
    for ch in 0..4 {
        assert!((out[ch] - over[ch]).abs() < 1e-5);
    }
}

#[test]
fn essential_mix_functions_hit_known_points() {
    assert_eq!(EssentialBlend::Multiply.mix(0.5, 0.5), 0.25);
    assert_eq!(EssentialBlend::Screen.mix(0.5, 0.5), 0.75);
    assert!((EssentialBlend::Difference.mix(0.2, 0.7) - 0.5).abs() < 1e-6);
    assert_eq!(EssentialBlend::Add.mix(0.8, 0.8), 1.0);
    assert_eq!(EssentialBlend::Subtract.mix(0.2, 0.2), 0.0);
    assert_eq!(EssentialBlend::HardMix.mix(0.9, 0.9), 1.0);
    assert_eq!(EssentialBlend::Phoenix.mix(0.3, 0.3), 1.0);
    for mode in EssentialBlend::ALL {
        for cb in [0.0, 0.25, 0.5, 1.0] {
            for cs in [0.0, 0.25, 0.5, 1.0] {
                let v = mode.mix(cb, cs);
                assert!(v.is_finite(), "{mode:?} {cb} {cs}");
            }
        }
    }
}
