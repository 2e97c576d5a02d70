//! [`PluInfo`]: the price-look-up code boundary type (spec.md §3, §6).
//!
//! spec.md names this type as "external" — owned by the domain, merely
//! consumed by the core. This crate still needs a concrete type to compile
//! against, so it defines the minimal value type spec.md's data model
//! describes, with none of the persistence/import machinery that is
//! explicitly out of core scope.

use std::cmp::Ordering;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::Smart3Error;

const MIN_PRICE: &str = "0.01";
const MAX_PRICE: &str = "999999.99";

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_graphic() && c != ':' && c != ';'
}

fn validate_text(field: &'static str, value: &str, min: usize, max: usize) -> Result<(), Smart3Error> {
    if !(min..=max).contains(&value.chars().count()) {
        return Err(Smart3Error::InvalidArgument(format!(
            "PLU {field} must be {min}-{max} characters, got {}",
            value.chars().count()
        )));
    }
    if !value.chars().all(is_allowed_char) {
        return Err(Smart3Error::InvalidArgument(format!(
            "PLU {field} contains a disallowed character: {value:?}"
        )));
    }
    Ok(())
}

/// A price-look-up code. Identity, equality, and ordering are all by `id`
/// alone (spec.md §3).
#[derive(Clone, Debug)]
pub struct PluInfo {
    id: String,
    name: String,
    price: Decimal,
    department: u32,
    tax: u32,
    macro_code: u32,
    quantity: u32,
}

impl PluInfo {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        department: u32,
        tax: u32,
        macro_code: u32,
        quantity: u32,
    ) -> Result<Self, Smart3Error> {
        let id = id.into();
        let name = name.into();
        validate_text("id", &id, 1, 13)?;
        validate_text("name", &name, 1, 21)?;
        let min: Decimal = MIN_PRICE.parse().unwrap();
        let max: Decimal = MAX_PRICE.parse().unwrap();
        if price < min || price > max {
            return Err(Smart3Error::InvalidArgument(format!(
                "PLU price {price} out of range [{MIN_PRICE}, {MAX_PRICE}]"
            )));
        }
        if !(1..=250).contains(&department) {
            return Err(Smart3Error::InvalidArgument(format!("PLU department {department} out of range [1, 250]")));
        }
        if !(1..=9).contains(&tax) {
            return Err(Smart3Error::InvalidArgument(format!("PLU tax {tax} out of range [1, 9]")));
        }
        if macro_code > 250 {
            return Err(Smart3Error::InvalidArgument(format!("PLU macro {macro_code} out of range [0, 250]")));
        }
        if !(1..=99999).contains(&quantity) {
            return Err(Smart3Error::InvalidArgument(format!("PLU quantity {quantity} out of range [1, 99999]")));
        }
        Ok(Self { id, name, price, department, tax, macro_code, quantity })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn department(&self) -> u32 {
        self.department
    }

    pub fn tax(&self) -> u32 {
        self.tax
    }

    pub fn macro_code(&self) -> u32 {
        self.macro_code
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn with_quantity(&self, quantity: u32) -> Result<Self, Smart3Error> {
        Self::new(self.id.clone(), self.name.clone(), self.price, self.department, self.tax, self.macro_code, quantity)
    }

    /// `round(price * 100, away-from-zero)`, the integer-cent wire value
    /// used by the `B81` reply and the broadcast PLU record (spec.md §4.6, §9).
    pub fn price_cents(&self) -> i32 {
        let cents = (self.price * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        cents.to_string().parse().expect("PLU price range guarantees this fits in i32")
    }
}

impl PartialEq for PluInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PluInfo {}

impl PartialOrd for PluInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PluInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}
