use {
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// A monetary amount in integer minor currency units (cents). Amounts are
/// never represented as floating point anywhere in the system.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(pub i64);

impl Amount {
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Renders cents as major units with thousands separators and two
    /// decimals, the format the frontend displays: `1234567` -> "12,345.67".
    pub fn display(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{sign}{}.{:02}", group_thousands(abs / 100), abs % 100)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

fn group_thousands(major: u64) -> String {
    let digits = major.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_cents_as_grouped_major_units() {
        assert_eq!(Amount(0).display(), "0.00");
        assert_eq!(Amount(5).display(), "0.05");
        assert_eq!(Amount(1000).display(), "10.00");
        assert_eq!(Amount(1500).display(), "15.00");
        assert_eq!(Amount(123456).display(), "1,234.56");
        assert_eq!(Amount(1234567).display(), "12,345.67");
        assert_eq!(Amount(100000000).display(), "1,000,000.00");
        assert_eq!(Amount(-2050).display(), "-20.50");
    }

    #[test]
    fn serializes_as_plain_integer() {
        assert_eq!(serde_json::to_string(&Amount(1500)).unwrap(), "1500");
        let amount: Amount = serde_json::from_str("1500").unwrap();
        assert_eq!(amount, Amount(1500));
    }
}
