use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

const MAX_SLUG_LEN: usize = 50;

/// Lowercase ASCII slug. Accented latin letters are folded to their base letter.
pub fn slugify(text: &str) -> String {
    let folded: String = text.chars().flat_map(fold_char).collect::<String>().to_lowercase();
    let slug = NON_ALNUM.replace_all(&folded, "-");
    let slug = slug.trim_matches('-');

    let mut cut = slug.chars().take(MAX_SLUG_LEN).collect::<String>();
    while cut.ends_with('-') {
        cut.pop();
    }
    cut
}

/// Slug with a short random disambiguator, used once after a collision.
pub fn slugify_with_suffix(text: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", slugify(text), &suffix[..6])
}

fn fold_char(c: char) -> Vec<char> {
    let folded = match c {
        'à' | 'â' | 'ä' | 'á' | 'ã' => "a",
        'À' | 'Â' | 'Ä' | 'Á' | 'Ã' => "A",
        'ç' => "c",
        'Ç' => "C",
        'é' | 'è' | 'ê' | 'ë' => "e",
        'É' | 'È' | 'Ê' | 'Ë' => "E",
        'î' | 'ï' | 'í' => "i",
        'Î' | 'Ï' | 'Í' => "I",
        'ô' | 'ö' | 'ó' | 'õ' => "o",
        'Ô' | 'Ö' | 'Ó' | 'Õ' => "O",
        'ù' | 'û' | 'ü' | 'ú' => "u",
        'Ù' | 'Û' | 'Ü' | 'Ú' => "U",
        'ÿ' => "y",
        'œ' => "oe",
        'Œ' => "OE",
        'æ' => "ae",
        'Æ' => "AE",
        _ => return vec![c],
    };
    folded.chars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_accents_and_punctuation() {
        assert_eq!(
            slugify("Nettoyage des locaux : Mairie de Sète"),
            "nettoyage-des-locaux-mairie-de-sete"
        );
        assert_eq!(slugify("Œuvres d'art & espaces verts"), "oeuvres-d-art-espaces-verts");
    }

    #[test]
    fn truncates_without_trailing_dash() {
        let slug = slugify(&"entretien espaces verts ".repeat(10));
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn suffix_differs_from_base() {
        let base = slugify("Traiteur");
        let suffixed = slugify_with_suffix("Traiteur");
        assert!(suffixed.starts_with("traiteur-"));
        assert_eq!(suffixed.len(), base.len() + 7);
    }
}
