//! Source display names to downstream currency codes.

use crate::core::rate::Target;
use std::collections::HashMap;

const LEDGER_CODES: [(&str, &str); 18] = [
    ("US DOLLAR", "USD"),
    ("EURO", "EUR"),
    ("POUND STERLING", "GBP"),
    ("CANADIAN DOLLAR", "CAD"),
    ("DANISH Krone", "DKK"),
    ("NORWEGIAN KRONE", "NOK"),
    ("Swedish Krona", "SEK"),
    ("SWISS FRANC", "CHF"),
    ("YENS(100)", "JPY"),
    ("AUSTRALIAN DOLLARS", "AUD"),
    ("Kuwait DINAR", "KWD"),
    ("SAUDI RIALS", "SAR"),
    ("U.A.E DIRHAM", "AED"),
    ("BAHRAIN DINAR", "BHD"),
    ("OMANI RIAL", "OMR"),
    ("QATAR RIAL", "QAR"),
    ("JORDAN DINAR", "JOD"),
    ("Egyptian Pound", "EGP"),
];

const MIDRANGE_CODES: [(&str, &str); 18] = [
    ("US DOLLAR", "US"),
    ("EURO", "EU"),
    ("POUND STERLING", "SL"),
    ("CANADIAN DOLLAR", "CD"),
    ("DANISH Krone", "DK"),
    ("NORWEGIAN KRONE", "NK"),
    ("Swedish Krona", "SK"),
    ("SWISS FRANC", "CH"),
    ("YENS(100)", "JY"),
    ("AUSTRALIAN DOLLARS", "AD"),
    ("Kuwait DINAR", "KD"),
    ("SAUDI RIALS", "SR"),
    ("U.A.E DIRHAM", "AE"),
    ("BAHRAIN DINAR", "BD"),
    ("OMANI RIAL", "OR"),
    ("QATAR RIAL", "QR"),
    ("JORDAN DINAR", "JD"),
    ("Egyptian Pound", "LE"),
];

/// Immutable per-target lookup tables, built once.
///
/// Names are matched exactly as the source publishes them; the source mixes
/// casing ("DANISH Krone", "Swedish Krona") and the tables follow it.
#[derive(Debug, Clone)]
pub struct CurrencyTranslator {
    ledger: HashMap<String, String>,
    midrange: HashMap<String, String>,
}

impl CurrencyTranslator {
    /// Builds the default tables with `overrides` layered on top. An override
    /// replaces the default code for the same display name or adds a new one.
    pub fn new(
        ledger_overrides: &HashMap<String, String>,
        midrange_overrides: &HashMap<String, String>,
    ) -> Self {
        let build = |defaults: &[(&str, &str)], overrides: &HashMap<String, String>| {
            let mut table: HashMap<String, String> = defaults
                .iter()
                .map(|(name, code)| (name.to_string(), code.to_string()))
                .collect();
            table.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
            table
        };

        Self {
            ledger: build(&LEDGER_CODES, ledger_overrides),
            midrange: build(&MIDRANGE_CODES, midrange_overrides),
        }
    }

    pub fn translate(&self, display_name: &str, target: Target) -> Option<&str> {
        let table = match target {
            Target::Ledger => &self.ledger,
            Target::Midrange => &self.midrange,
        };
        table.get(display_name).map(String::as_str)
    }
}

impl Default for CurrencyTranslator {
    fn default() -> Self {
        Self::new(&HashMap::new(), &HashMap::new())
    }
}
