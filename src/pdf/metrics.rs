//! Glyph advance widths for the two built-in fonts the invoice uses, taken from the standard
//! Helvetica AFM files (units per 1000 em, printable ASCII 32..=126).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFace {
    Regular,
    Bold,
}

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,                               // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015,                                             // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,                // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,                // 'N'..'Z'
    278, 278, 278, 469, 556, 333,                                                   // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,                // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,                // 'n'..'z'
    334, 260, 334, 584,                                                             // '{'..'~'
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

const FALLBACK_ADVANCE: u16 = 556;

fn advance(face: FontFace, ch: char) -> u16 {
    let table = match face {
        FontFace::Regular => &HELVETICA,
        FontFace::Bold => &HELVETICA_BOLD,
    };
    let code = ch as u32;
    if (32..=126).contains(&code) {
        table[(code - 32) as usize]
    } else {
        FALLBACK_ADVANCE
    }
}

/// Rendered width of `text` in points.
pub fn text_width_pt(face: FontFace, text: &str, font_size_pt: f32) -> f32 {
    let units: u32 = text.chars().map(|ch| advance(face, ch) as u32).sum();
    units as f32 / 1000.0 * font_size_pt
}

/// Longest prefix of `text` that fits in `max_width_pt`, with `...` appended when cut.
pub fn fit_text(face: FontFace, text: &str, font_size_pt: f32, max_width_pt: f32) -> String {
    if text_width_pt(face, text, font_size_pt) <= max_width_pt {
        return text.to_string();
    }

    const ELLIPSIS: &str = "...";
    let budget = max_width_pt - text_width_pt(face, ELLIPSIS, font_size_pt);
    let mut out = String::new();
    let mut used = 0.0;
    for ch in text.chars() {
        let w = advance(face, ch) as f32 / 1000.0 * font_size_pt;
        if used + w > budget {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push_str(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_widths() {
        // "INVOICE" in Helvetica-Bold: I 278, N 722, V 667, O 778, I 278, C 722, E 667.
        let w = text_width_pt(FontFace::Bold, "INVOICE", 18.0);
        assert!((w - 4112.0 / 1000.0 * 18.0).abs() < 1e-3);

        assert_eq!(text_width_pt(FontFace::Regular, "", 10.0), 0.0);
        assert!((text_width_pt(FontFace::Regular, "0", 10.0) - 5.56).abs() < 1e-4);
    }

    #[test]
    fn bold_is_never_narrower_for_letters() {
        for ch in ('a'..='z').chain('A'..='Z') {
            assert!(advance(FontFace::Bold, ch) >= advance(FontFace::Regular, ch), "{ch}");
        }
    }

    #[test]
    fn fit_text_leaves_short_text_alone_and_cuts_long_text() {
        assert_eq!(fit_text(FontFace::Regular, "Fence install", 10.0, 200.0), "Fence install");

        let long = "x".repeat(200);
        let cut = fit_text(FontFace::Regular, &long, 10.0, 100.0);
        assert!(cut.ends_with("..."));
        assert!(text_width_pt(FontFace::Regular, &cut, 10.0) <= 100.0);
    }
}
