use phf::phf_map;
use unicode_normalization::UnicodeNormalization;

use crate::general::MAX_SLUG_LEN;

static ND_CHARMAP: phf::Map<char, &'static str> = phf_map! {
    'Æ' => "AE",
    'æ' => "ae",
    'Ð' => "D",
    'ð' => "d",
    'Ø' => "O",
    'ø' => "o",
    'Þ' => "Th",
    'þ' => "th",
    'ß' => "ss",
    'Đ' => "D",
    'đ' => "d",
    'Ħ' => "H",
    'ħ' => "h",
    'ı' => "i",
    'Ł' => "L",
    'ł' => "l",
    'Œ' => "Oe",
    'œ' => "oe",
};

fn remove_diacritics(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for c in text.nfkd() {
        if let Some(mapped) = ND_CHARMAP.get(&c) {
            result.push_str(mapped);
        } else if c.is_ascii() {
            result.push(c);
        } else if c.is_alphabetic() {
            result.push(' ');
        }
    }

    result
}

/// Creates url slug from title, e.g. "Žluťoučký Kůň: Part 2" -> "zlutoucky-kun-part-2"
pub fn slugify(title: &str) -> String {
    let ascii = remove_diacritics(title).to_lowercase();
    let mut slug = String::with_capacity(ascii.len());
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let mut slug = slug.trim_end_matches('-').to_string();
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        slug = slug.trim_end_matches('-').to_string();
    }
    slug
}

/// Name of object in store - keeps extension, replaces anything unsafe in base name
pub fn object_name(file_name: &str) -> String {
    let (base, ext) = match file_name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => (base, Some(ext)),
        _ => (file_name, None),
    };
    let mut name = slugify(base);
    if name.is_empty() {
        name.push_str("image");
    }
    if let Some(ext) = ext {
        let ext = ext
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        if !ext.is_empty() {
            name.push('.');
            name.push_str(&ext);
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_diacritics() {
        assert_eq!(remove_diacritics("Æ"), "AE");
        assert_eq!(remove_diacritics("œ"), "oe");
        assert_eq!(remove_diacritics("Pěl ďábelské"), "Pel dabelske");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Žluťoučký Kůň: Part 2"), "zlutoucky-kun-part-2");
        assert_eq!(slugify("  The Night -- Shift!  "), "the-night-shift");
        assert_eq!(slugify("???"), "");
        let long = "a ".repeat(200);
        let slug = slugify(&long);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_object_name() {
        assert_eq!(object_name("Page 01.PNG"), "page-01.png");
        assert_eq!(object_name(".hidden"), "hidden");
        assert_eq!(object_name("ščř.jpg"), "scr.jpg");
        assert_eq!(object_name("???.webp"), "image.webp");
    }
}
