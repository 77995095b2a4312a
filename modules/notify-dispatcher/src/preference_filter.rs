use domain::ValidatedGlitch;

use crate::subscriber::Preferences;

/// §4.4 step 2: a glitch is eligible for a subscriber iff every configured
/// preference clears. Unset category/retailer filters (empty lists) are
/// treated as "no restriction" per §4.4's "if non-empty" wording.
pub fn passes(glitch: &ValidatedGlitch, prefs: &Preferences) -> bool {
    if glitch.profit_margin < prefs.min_profit_margin {
        return false;
    }

    if !prefs.categories.is_empty() {
        let category = glitch.product.category.to_lowercase();
        let matches = prefs
            .categories
            .iter()
            .any(|c| category.contains(&c.to_lowercase()));
        if !matches {
            return false;
        }
    }

    if !prefs.retailers.is_empty() {
        let retailer = glitch.product.retailer_id.to_lowercase();
        let matches = prefs
            .retailers
            .iter()
            .any(|r| r.to_lowercase() == retailer);
        if !matches {
            return false;
        }
    }

    let price = glitch.product.current_price;
    if price < prefs.min_price || price > prefs.max_price {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{GlitchType, ProductSnapshot, StockStatus};

    fn glitch(price: f64, margin: f64, category: &str, retailer: &str) -> ValidatedGlitch {
        ValidatedGlitch {
            id: "g1".into(),
            anomaly_id: "a1".into(),
            product: ProductSnapshot {
                title: "Widget".into(),
                current_price: price,
                original_price: Some(price * 10.0),
                stock_status: StockStatus::InStock,
                retailer_id: retailer.into(),
                url: "https://example.com".into(),
                category: category.into(),
            },
            is_glitch: true,
            confidence: 90,
            reasoning: "x".into(),
            glitch_type: GlitchType::DecimalError,
            profit_margin: margin,
            validated_at: chrono::Utc::now(),
        }
    }

    fn wide_open_prefs() -> Preferences {
        Preferences {
            min_profit_margin: 0.0,
            categories: vec![],
            retailers: vec![],
            min_price: 0.0,
            max_price: f64::MAX,
            ..Default::default()
        }
    }

    #[test]
    fn empty_filters_accept_anything_within_price_and_margin() {
        let prefs = wide_open_prefs();
        assert!(passes(&glitch(9.99, 90.0, "Electronics", "amazon"), &prefs));
    }

    #[test]
    fn rejects_below_minimum_profit_margin() {
        let mut prefs = wide_open_prefs();
        prefs.min_profit_margin = 50.0;
        assert!(!passes(&glitch(9.99, 40.0, "Electronics", "amazon"), &prefs));
    }

    #[test]
    fn category_filter_is_a_case_insensitive_substring_match() {
        let mut prefs = wide_open_prefs();
        prefs.categories = vec!["electro".into()];
        assert!(passes(&glitch(9.99, 90.0, "Electronics", "amazon"), &prefs));

        prefs.categories = vec!["toys".into()];
        assert!(!passes(&glitch(9.99, 90.0, "Electronics", "amazon"), &prefs));
    }

    #[test]
    fn retailer_filter_restricts_to_listed_retailers() {
        let mut prefs = wide_open_prefs();
        prefs.retailers = vec!["walmart".into()];
        assert!(!passes(&glitch(9.99, 90.0, "Electronics", "amazon"), &prefs));

        prefs.retailers = vec!["amazon".into()];
        assert!(passes(&glitch(9.99, 90.0, "Electronics", "amazon"), &prefs));
    }

    #[test]
    fn price_must_fall_within_the_configured_range() {
        let mut prefs = wide_open_prefs();
        prefs.min_price = 20.0;
        prefs.max_price = 100.0;
        assert!(!passes(&glitch(9.99, 90.0, "Electronics", "amazon"), &prefs));
        assert!(passes(&glitch(50.0, 90.0, "Electronics", "amazon"), &prefs));
    }
}
