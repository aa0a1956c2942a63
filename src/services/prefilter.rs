//! Local keyword heuristic run before the oracle.
//!
//! Deliberately permissive: it only has to keep clearly irrelevant pages
//! away from the oracle, which makes the final decision.

const NEGATIONS: &[&str] = &[
    "no food",
    "food not provided",
    "no refreshments",
    "refreshments not provided",
    "food will not be provided",
    "refreshments will not be provided",
    "bring your own food",
    "byof",
    "byo food",
];

const EXPLICIT_FREE: &[&str] = &[
    "free food",
    "free pizza",
    "free lunch",
    "free dinner",
    "free breakfast",
    "free snacks",
    "free refreshments",
    "complimentary food",
    "complimentary refreshments",
    "food will be provided",
    "refreshments will be provided",
];

const FOOD_PROVIDED: &[&str] = &[
    "food provided",
    "lunch provided",
    "dinner provided",
    "breakfast provided",
    "refreshments provided",
    "snacks provided",
    "meals provided",
    "light refreshments",
    "catering provided",
];

const SPECIFIC_FOODS: &[&str] = &[
    "pizza",
    "donuts",
    "doughnuts",
    "bagels",
    "boba",
    "tacos",
    "ice cream",
    "cookies",
    "brownies",
    "sandwiches",
    "subs",
    "wraps",
    "burgers",
    "hot dogs",
    "wings",
    "chicken",
    "pasta",
    "salad",
    "fruit",
    "vegetables",
    "chips",
    "popcorn",
    "pretzels",
    "candy",
];

const BEVERAGES: &[&str] = &["coffee", "tea", "soda", "juice", "water bottles", "energy drinks"];

const MEAL_TYPES: &[&str] = &[
    "appetizers",
    "hors d'oeuvres",
    "buffet",
    "potluck",
    "barbecue",
    "bbq",
    "cookout",
    "picnic",
    "brunch",
];

/// Strongest keyword evidence found in a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoodSignal {
    /// A negation phrase is present; overrides everything else.
    Negated,
    ExplicitFree,
    /// A "provided" phrase or a specific food item.
    ProvidedOrItem,
    MealOrBeverage,
    None,
}

impl FoodSignal {
    pub fn is_positive(self) -> bool {
        matches!(
            self,
            FoodSignal::ExplicitFree | FoodSignal::ProvidedOrItem | FoodSignal::MealOrBeverage
        )
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Classify `text` by the strongest signal it carries.
pub fn food_signal(text: &str) -> FoodSignal {
    let t = text.to_lowercase();

    if contains_any(&t, NEGATIONS) {
        return FoodSignal::Negated;
    }
    if contains_any(&t, EXPLICIT_FREE) {
        return FoodSignal::ExplicitFree;
    }
    if contains_any(&t, FOOD_PROVIDED) || contains_any(&t, SPECIFIC_FOODS) {
        return FoodSignal::ProvidedOrItem;
    }
    if contains_any(&t, MEAL_TYPES) || contains_any(&t, BEVERAGES) {
        return FoodSignal::MealOrBeverage;
    }
    FoodSignal::None
}

/// Whether `text` plausibly advertises food. Negation always wins.
pub fn might_have_food(text: &str) -> bool {
    food_signal(text).is_positive()
}
