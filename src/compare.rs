//! Line comparators.

use std::cell::RefCell;
use std::cmp::Ordering;

use feruca::Collator;

/// Line comparison function.
pub type Comparer = fn(&str, &str) -> Ordering;

/// Sorting direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Default for Order {
    fn default() -> Self {
        Order::Asc
    }
}

/// String collation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collation {
    /// Language-sensitive ordering following the Unicode Collation Algorithm with the CLDR root
    /// tailoring: accents and case only decide between otherwise equal lines, lowercase first.
    /// Raw bytes break any remaining tie.
    Locale,
    /// Raw code point ordering.
    Ordinal,
}

impl Default for Collation {
    fn default() -> Self {
        Collation::Locale
    }
}

/// Builds a total order over lines for the given direction and collation.
///
/// Distinct lines never compare equal under any of the returned comparers.
pub fn comparer(order: Order, collation: Collation) -> Comparer {
    match (order, collation) {
        (Order::Asc, Collation::Locale) => locale_asc,
        (Order::Desc, Collation::Locale) => locale_desc,
        (Order::Asc, Collation::Ordinal) => ordinal_asc,
        (Order::Desc, Collation::Ordinal) => ordinal_desc,
    }
}

fn locale_asc(a: &str, b: &str) -> Ordering {
    locale_cmp(a, b)
}

fn locale_desc(a: &str, b: &str) -> Ordering {
    locale_cmp(a, b).reverse()
}

fn ordinal_asc(a: &str, b: &str) -> Ordering {
    a.cmp(b)
}

fn ordinal_desc(a: &str, b: &str) -> Ordering {
    a.cmp(b).reverse()
}

thread_local! {
    static COLLATOR: RefCell<Collator> = RefCell::new(Collator::default());
}

fn locale_cmp(a: &str, b: &str) -> Ordering {
    return COLLATOR
        .with(|collator| collator.borrow_mut().collate(a, b))
        .then_with(|| a.cmp(b));
}

#[cfg(test)]
mod test {
    use std::cmp::Ordering;

    use rstest::*;

    use super::{comparer, Collation, Order};

    #[rstest]
    #[case(Collation::Locale, "apple", "banana", Ordering::Less)]
    #[case(Collation::Locale, "Banana", "apple", Ordering::Greater)]
    #[case(Collation::Locale, "a", "A", Ordering::Less)]
    #[case(Collation::Locale, "ab", "Ab", Ordering::Less)]
    #[case(Collation::Locale, "same", "same", Ordering::Equal)]
    #[case(Collation::Ordinal, "Banana", "apple", Ordering::Less)]
    #[case(Collation::Ordinal, "a", "A", Ordering::Greater)]
    #[case(Collation::Ordinal, "", "a", Ordering::Less)]
    #[case(Collation::Ordinal, "same", "same", Ordering::Equal)]
    fn test_ascending_comparer(
        #[case] collation: Collation,
        #[case] a: &str,
        #[case] b: &str,
        #[case] expected: Ordering,
    ) {
        let compare = comparer(Order::Asc, collation);
        assert_eq!(compare(a, b), expected);
        assert_eq!(compare(b, a), expected.reverse());
    }

    #[rstest]
    #[case(Collation::Locale)]
    #[case(Collation::Ordinal)]
    fn test_descending_is_reversed(#[case] collation: Collation) {
        let asc = comparer(Order::Asc, collation);
        let desc = comparer(Order::Desc, collation);
        let words = ["cherry", "Apple", "apple", "banana", "", "Äpfel", "z"];

        for a in words {
            for b in words {
                assert_eq!(desc(a, b), asc(a, b).reverse(), "a={:?}, b={:?}", a, b);
            }
        }
    }

    #[rstest]
    #[case(Collation::Locale)]
    #[case(Collation::Ordinal)]
    fn test_distinct_lines_never_equal(#[case] collation: Collation) {
        let compare = comparer(Order::Asc, collation);
        let words = ["a", "A", "ß", "ss", "SS", "straße", "STRASSE", "i", "İ"];

        for a in words {
            for b in words {
                if a != b {
                    assert_ne!(compare(a, b), Ordering::Equal, "a={:?}, b={:?}", a, b);
                }
            }
        }
    }

    #[rstest]
    #[case("éclair", "fig", Ordering::Less)]
    #[case("Ångström", "b", Ordering::Less)]
    #[case("eclair", "éclair", Ordering::Less)]
    #[case("zebra", "Äpfel", Ordering::Greater)]
    #[case("résumé", "rose", Ordering::Less)]
    fn test_locale_accented_letters(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        let compare = comparer(Order::Asc, Collation::Locale);
        assert_eq!(compare(a, b), expected);
        assert_eq!(compare(b, a), expected.reverse());
    }

    #[test]
    fn test_locale_sorts_accents_with_base_letters() {
        let compare = comparer(Order::Asc, Collation::Locale);
        let mut words = vec!["zebra", "éclair", "eclair", "fig", "Ångström", "apple"];
        words.sort_by(|a, b| compare(a, b));

        assert_eq!(words, vec!["Ångström", "apple", "eclair", "éclair", "fig", "zebra"]);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Order::default(), Order::Asc);
        assert_eq!(Collation::default(), Collation::Locale);
    }
}
