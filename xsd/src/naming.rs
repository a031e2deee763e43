/// Local shape name for an XSD type or element name.
pub fn shape_name(xml_name: &str) -> String {
    let mut result = String::new();
    for word in split_words(xml_name) {
        push_capitalized(&mut result, word);
    }
    result
}

/// Returns `base` if it is free, otherwise the first of `base2`, `base3`, ... that is.
pub fn disambiguate(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Words of an XML name: separated by `-`, `_` or `.`, each of which may itself be camel-cased.
fn split_words(name: &str) -> Vec<&str> {
    name.split(['-', '_', '.'])
        .filter(|w| !w.is_empty())
        .flat_map(split_camel_case)
        .collect()
}

fn split_camel_case(name: &str) -> Vec<&str> {
    let mut words = vec![];
    let mut start = 0;
    for (i, c) in name.char_indices().skip(1) {
        if c.is_uppercase() {
            words.push(&name[start..i]);
            start = i;
        }
    }
    if start < name.len() {
        words.push(&name[start..]);
    }
    words
}

/// Appends `word` with its first character upper-cased. Runs of capitals such as `USAddress`
/// split into single letters, so the rest of the word keeps its case.
fn push_capitalized(result: &mut String, word: &str) {
    let mut chars = word.chars();
    if let Some(first) = chars.next() {
        first.to_uppercase().for_each(|c| result.push(c));
        result.extend(chars);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_splits_at_capitals() {
        assert_eq!(split_camel_case("helloWorld"), vec!["hello", "World"]);
        assert_eq!(split_camel_case("i"), vec!["i"]);
        assert_eq!(split_camel_case("inI"), vec!["in", "I"]);
    }

    #[test]
    fn xml_names_split_on_separators() {
        assert_eq!(split_words("purchase-orderLine"), vec!["purchase", "order", "Line"]);
        assert!(split_words("--").is_empty());
    }

    #[test]
    fn shape_names_from_xml_names() {
        assert_eq!(shape_name("book"), "Book");
        assert_eq!(shape_name("shipping-address"), "ShippingAddress");
        assert_eq!(shape_name("purchase_order.line"), "PurchaseOrderLine");
        assert_eq!(shape_name("USAddress"), "USAddress");
        assert_eq!(shape_name("bookType"), "BookType");
    }

    #[test]
    fn disambiguate_appends_first_free_suffix() {
        let taken = ["Address", "Address2"];
        assert_eq!(disambiguate("Address", |c| taken.contains(&c)), "Address3");
        assert_eq!(disambiguate("Person", |c| taken.contains(&c)), "Person");
    }
}
