/// Storefront slug for a category name.
///
/// Lowercases, folds Latin diacritics, drops anything outside
/// `[a-z0-9]`, whitespace and `-`, then collapses separator runs to a
/// single `-`.
pub fn slugify(name: &str) -> String {
    let folded: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(fold_diacritic)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();

    let mut slug = String::with_capacity(folded.len());
    let mut pending_separator = false;
    for c in folded.chars() {
        if c.is_whitespace() || c == '-' {
            pending_separator = true;
            continue;
        }
        if pending_separator && !slug.is_empty() {
            slug.push('-');
        }
        pending_separator = false;
        slug.push(c);
    }
    slug
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_folds_and_collapses() {
        assert_eq!(slugify("  Jardín & Piscinas  "), "jardin-piscinas");
        assert_eq!(slugify("Año -- Nuevo"), "ano-nuevo");
        assert_eq!(slugify("Calefacción/Clima"), "calefaccionclima");
        assert_eq!(slugify("-Bombas-"), "bombas");
    }

    #[test]
    fn test_slugify_unusable_name_is_empty() {
        assert_eq!(slugify("***"), "");
        assert_eq!(slugify(""), "");
    }
}
