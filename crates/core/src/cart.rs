use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::candidate::{Candidate, Variant};
use crate::errors::DomainError;

const DEFAULT_CURRENCY: &str = "EUR";
const CHECKOUT_SANDBOX_URL: &str = "https://checkout-sandbox.example.com";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartItemId(pub u64);

impl std::fmt::Display for CartItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub candidate: Candidate,
    pub quantity: u32,
    pub variant: Variant,
}

impl CartItem {
    /// `None` when price times quantity does not fit a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> {
        line_total(&self.candidate, self.quantity)
    }
}

fn line_total(candidate: &Candidate, quantity: u32) -> Option<Decimal> {
    candidate.price().checked_mul(Decimal::from(quantity))
}

fn checked_sum(lines: impl IntoIterator<Item = Option<Decimal>>) -> Option<Decimal> {
    lines.into_iter().try_fold(Decimal::ZERO, |total, line| total.checked_add(line?))
}

fn total_overflow(quantity: u32) -> DomainError {
    DomainError::InvariantViolation(format!("cart total overflows with quantity {quantity}"))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub items: Vec<CartItem>,
    pub total_price: Decimal,
    pub currency: String,
    pub by_source: BTreeMap<String, Decimal>,
    pub delivery_summary: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStepStatus {
    SimulatedDone,
}

/// One retailer's leg of a simulated checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckoutStep {
    pub source_id: String,
    pub step_number: usize,
    pub description: String,
    pub url: String,
    pub subtotal: Decimal,
    pub status: CheckoutStepStatus,
}

/// Walkthrough of paying every retailer in the cart. Nothing is charged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckoutSimulation {
    pub steps: Vec<CheckoutStep>,
    pub total_price: Decimal,
    pub currency: String,
    pub payment_entered_once: bool,
    pub address_entered_once: bool,
    pub message: String,
}

/// One combined basket spanning several retailers.
///
/// Every mutation keeps the cart total representable; a change that would
/// overflow it is refused and leaves the cart as it was.
#[derive(Clone, Debug, Default)]
pub struct Cart {
    items: Vec<CartItem>,
    next_id: u64,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn get(&self, id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn add(
        &mut self,
        candidate: Candidate,
        quantity: u32,
        variant: Option<Variant>,
    ) -> Result<CartItemId, DomainError> {
        let quantity = quantity.max(1);
        let lines = self
            .items
            .iter()
            .map(CartItem::line_total)
            .chain(std::iter::once(line_total(&candidate, quantity)));
        if checked_sum(lines).is_none() {
            return Err(total_overflow(quantity));
        }

        self.next_id += 1;
        let id = CartItemId(self.next_id);
        let variant = variant.unwrap_or_else(|| candidate.variant().clone());
        self.items.push(CartItem { id, candidate, quantity, variant });
        Ok(id)
    }

    pub fn remove(&mut self, id: CartItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    /// A quantity below one removes the item. `Ok(false)` for an unknown id.
    pub fn update_quantity(&mut self, id: CartItemId, quantity: u32) -> Result<bool, DomainError> {
        if quantity < 1 {
            return Ok(self.remove(id));
        }
        let Some(index) = self.position(id) else {
            return Ok(false);
        };
        self.ensure_total_with(index, &self.items[index].candidate, quantity)?;
        self.items[index].quantity = quantity;
        Ok(true)
    }

    pub fn replace(
        &mut self,
        id: CartItemId,
        candidate: Candidate,
        quantity: u32,
    ) -> Result<bool, DomainError> {
        let quantity = quantity.max(1);
        let Some(index) = self.position(id) else {
            return Ok(false);
        };
        self.ensure_total_with(index, &candidate, quantity)?;
        let item = &mut self.items[index];
        item.variant = candidate.variant().clone();
        item.candidate = candidate;
        item.quantity = quantity;
        Ok(true)
    }

    fn position(&self, id: CartItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Checks the total with the line at `index` swapped for `candidate` x `quantity`.
    fn ensure_total_with(
        &self,
        index: usize,
        candidate: &Candidate,
        quantity: u32,
    ) -> Result<(), DomainError> {
        let lines = self.items.iter().enumerate().map(|(position, item)| {
            if position == index {
                line_total(candidate, quantity)
            } else {
                item.line_total()
            }
        });
        checked_sum(lines).map(|_| ()).ok_or_else(|| total_overflow(quantity))
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }

    pub fn summary(&self) -> CartSummary {
        let mut by_source: BTreeMap<String, Decimal> = BTreeMap::new();
        for item in &self.items {
            let subtotal =
                by_source.entry(item.candidate.source_id().to_string()).or_insert(Decimal::ZERO);
            *subtotal = checked_sum([Some(*subtotal), item.line_total()]).unwrap_or(Decimal::MAX);
        }

        let total_price = checked_sum(self.items.iter().map(CartItem::line_total))
            .unwrap_or(Decimal::MAX)
            .round_dp(2);
        let delivery_summary = self
            .items
            .iter()
            .filter_map(|item| item.candidate.delivery_estimate_in_days())
            .max()
            .map_or_else(|| "Variable".to_string(), |days| format!("Max. {days} days"));
        let currency = self
            .items
            .first()
            .map_or(DEFAULT_CURRENCY, |item| item.candidate.currency())
            .to_string();

        CartSummary { items: self.items.clone(), total_price, currency, by_source, delivery_summary }
    }

    /// One step per retailer in the cart, in retailer order. Payment details and
    /// the shipping address are entered once for all of them.
    pub fn simulate_checkout(&self) -> CheckoutSimulation {
        let summary = self.summary();
        let steps: Vec<CheckoutStep> = summary
            .by_source
            .iter()
            .enumerate()
            .map(|(index, (source_id, subtotal))| CheckoutStep {
                source_id: source_id.clone(),
                step_number: index + 1,
                description: format!("Order placed with {source_id}"),
                url: format!("{CHECKOUT_SANDBOX_URL}/{source_id}"),
                subtotal: subtotal.round_dp(2),
                status: CheckoutStepStatus::SimulatedDone,
            })
            .collect();

        let message = if steps.is_empty() {
            "Cart is empty, nothing to check out.".to_string()
        } else {
            format!(
                "Simulated checkout across {} retailer(s). No real payment was made.",
                steps.len()
            )
        };

        CheckoutSimulation {
            steps,
            total_price: summary.total_price,
            currency: summary.currency,
            payment_entered_once: true,
            address_entered_once: true,
            message,
        }
    }
}
