//! Static demo retailers used when no live source is configured.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::candidate::{Candidate, Variant};
use crate::domain::requirement::Category;
use crate::search::{ProductSource, SearchConstraints, SourceError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogKind {
    Clothing,
    Food,
}

#[derive(Clone, Copy, Debug)]
struct Seed {
    id: &'static str,
    title: &'static str,
    price_cents: i64,
    delivery_days: u32,
    sizes: &'static [&'static str],
    color: Option<&'static str>,
}

const fn seed(
    id: &'static str,
    title: &'static str,
    price_cents: i64,
    delivery_days: u32,
    sizes: &'static [&'static str],
    color: Option<&'static str>,
) -> Seed {
    Seed { id, title, price_cents, delivery_days, sizes, color }
}

const SML: &[&str] = &["S", "M", "L"];
const ML: &[&str] = &["M", "L"];
const NONE: &[&str] = &[];

const STYLEHUB: &[Seed] = &[
    seed("sh-1", "Men's Ski Jacket water-repellent", 8_999, 3, SML, None),
    seed("sh-2", "Ski Trousers warm lined", 5_999, 4, ML, None),
    seed("sh-3", "Team Logo Hoodie", 3_499, 2, &["S", "M"], Some("Navy")),
    seed("sh-4", "Winter Beanie team colours", 1_999, 2, NONE, None),
    seed("sh-5", "Thermal Underwear Set", 4_499, 5, ML, None),
    seed("sh-6", "Ski Gloves waterproof", 2_999, 3, NONE, None),
    seed("sh-7", "Striped Scarf", 2_499, 2, NONE, None),
    seed("sh-8", "Men's Softshell Jacket", 7_999, 4, ML, None),
    seed("sh-9", "Men's Fleece Vest", 4_999, 3, SML, None),
    seed("sh-10", "Ski Goggles UV400", 3_999, 2, NONE, None),
    seed("sh-11", "Glitter Party Shirt", 2_799, 2, &["S", "M"], Some("Gold")),
    seed("sh-12", "Winter Socks 3-pack", 1_499, 2, NONE, None),
];

const URBANOUTFIT: &[Seed] = &[
    seed("uo-1", "Urban Style Ski Jacket", 12_900, 5, ML, Some("Black")),
    seed("uo-2", "Warm Winter Jacket", 9_900, 4, SML, None),
    seed("uo-3", "Printed Party Hoodie", 4_500, 2, &["M"], Some("Grey")),
    seed("uo-4", "Winter Jogging Trousers", 3_999, 3, ML, None),
    seed("uo-5", "Ski Balaclava", 1_800, 2, NONE, None),
    seed("uo-6", "Fleece Pullover", 5_499, 4, &["M"], None),
    seed("uo-7", "Waterproof Ski Trousers", 6_900, 5, ML, None),
    seed("uo-8", "Long-sleeve Team Jersey", 4_999, 3, &["S", "M"], Some("Red")),
    seed("uo-9", "Oversize Sweatshirt", 4_200, 3, ML, None),
    seed("uo-10", "Winter Cargo Trousers", 6_499, 4, ML, None),
    seed("uo-11", "Reflective Event Parka", 8_900, 5, &["M"], Some("Black")),
    seed("uo-12", "Team Logo Cap", 2_299, 2, NONE, None),
];

const SPORTDIRECT: &[Seed] = &[
    seed("sd-1", "Ski Jacket Pro waterproof", 11_999, 4, SML, None),
    seed("sd-2", "Ventilated Ski Trousers", 7_499, 4, ML, None),
    seed("sd-3", "Ski Helmet size M/L", 5_999, 3, NONE, None),
    seed("sd-4", "Ski Back Protector", 8_900, 5, ML, None),
    seed("sd-5", "Thermal Long-sleeve Base Layer", 2_999, 2, SML, None),
    seed("sd-6", "Warm Ski Boots", 14_900, 5, &["42", "43", "44"], None),
    seed("sd-7", "Lined Ski Gloves", 3_499, 3, NONE, None),
    seed("sd-8", "Black Neck Warmer", 1_299, 2, NONE, Some("Black")),
    seed("sd-9", "Women's Softshell Jacket", 6_999, 4, &["XS", "S", "M"], None),
    seed("sd-10", "Ski Goggles interchangeable lens", 4_499, 2, NONE, None),
    seed("sd-11", "One-piece Team Anorak", 9_499, 5, ML, None),
    seed("sd-12", "Waterproof Hiking Boots", 7_999, 4, &["41", "42", "43"], None),
];

const PANTRY: &[Seed] = &[
    seed("pa-1", "Gummy Bears 5kg party tub", 2_499, 2, NONE, None),
    seed("pa-2", "Crisps Original 6-pack snacks", 849, 1, NONE, None),
    seed("pa-3", "Trail Mix 1kg healthy snacks", 999, 2, NONE, None),
    seed("pa-4", "Energy Drink 24 cans", 4_299, 2, NONE, None),
    seed("pa-5", "Cola Zero 24 bottles", 1_499, 1, NONE, None),
    seed("pa-6", "Apple Juice 5l bag-in-box", 899, 1, NONE, None),
    seed("pa-7", "Sparkling Water 12x1.5l", 1_149, 1, NONE, None),
    seed("pa-8", "Coffee Beans 1kg", 1_299, 2, NONE, None),
    seed("pa-9", "Frozen Pizza 4-pack party food", 799, 1, NONE, None),
    seed("pa-10", "Sandwich Platter 20 pieces catering", 4_999, 3, NONE, None),
    seed("pa-11", "Hackathon Snack Box 30 people", 8_900, 3, NONE, None),
    seed("pa-12", "Breakfast Set 20 people catering", 7_900, 3, NONE, None),
    seed("pa-13", "Chocolate Biscuits 800g", 499, 1, NONE, None),
    seed("pa-14", "Chips and Dips Party Set", 1_999, 2, NONE, None),
];

/// In-memory retailer backed by fixed seed data.
#[derive(Clone, Debug)]
pub struct CatalogSource {
    id: &'static str,
    kind: CatalogKind,
    seeds: &'static [Seed],
}

impl CatalogSource {
    pub fn stylehub() -> Self {
        Self { id: "stylehub", kind: CatalogKind::Clothing, seeds: STYLEHUB }
    }

    pub fn urbanoutfit() -> Self {
        Self { id: "urbanoutfit", kind: CatalogKind::Clothing, seeds: URBANOUTFIT }
    }

    pub fn sportdirect() -> Self {
        Self { id: "sportdirect", kind: CatalogKind::Clothing, seeds: SPORTDIRECT }
    }

    pub fn pantry() -> Self {
        Self { id: "pantry", kind: CatalogKind::Food, seeds: PANTRY }
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    fn carries(&self, category: Option<&Category>) -> bool {
        match (category, self.kind) {
            (Some(Category::Clothing), CatalogKind::Food) => false,
            (Some(Category::Food), CatalogKind::Clothing) => false,
            _ => true,
        }
    }

    fn to_candidate(&self, seed: &Seed) -> Result<Candidate, SourceError> {
        let mut variant = Variant {
            size: seed.sizes.first().map(|size| size.to_string()),
            color: seed.color.map(str::to_string),
            sku: Some(seed.id.to_uppercase()),
            ..Variant::default()
        };
        if !seed.sizes.is_empty() {
            variant.extra.insert("sizes".to_string(), seed.sizes.join(","));
        }

        Candidate::new(self.id, seed.id, seed.title, Decimal::new(seed.price_cents, 2), "EUR")
            .map(|candidate| {
                candidate
                    .with_delivery_estimate(seed.delivery_days)
                    .with_product_url(format!("https://{}.example/products/{}", self.id, seed.id))
                    .with_variant(variant)
            })
            .map_err(|error| SourceError::Malformed {
                source_id: self.id.to_string(),
                message: error.to_string(),
            })
    }
}

#[async_trait]
impl ProductSource for CatalogSource {
    fn id(&self) -> &str {
        self.id
    }

    async fn search(
        &self,
        query: &str,
        constraints: &SearchConstraints,
    ) -> Result<Vec<Candidate>, SourceError> {
        if !self.carries(constraints.category.as_ref()) {
            return Ok(Vec::new());
        }

        let tokens: Vec<String> = query
            .split_whitespace()
            .filter(|token| token.chars().count() >= 3)
            .map(str::to_lowercase)
            .collect();
        let matches = |seed: &Seed| {
            let title = seed.title.to_lowercase();
            tokens.iter().any(|token| title.contains(token.as_str()))
        };

        let (hits, rest): (Vec<&Seed>, Vec<&Seed>) =
            self.seeds.iter().partition(|seed| matches(*seed));
        hits.into_iter()
            .chain(rest)
            .take(constraints.limit)
            .map(|seed| self.to_candidate(seed))
            .collect()
    }
}

/// The four demo retailers in registration order.
pub fn demo_sources() -> Vec<Arc<dyn ProductSource>> {
    vec![
        Arc::new(CatalogSource::stylehub()),
        Arc::new(CatalogSource::urbanoutfit()),
        Arc::new(CatalogSource::sportdirect()),
        Arc::new(CatalogSource::pantry()),
    ]
}
