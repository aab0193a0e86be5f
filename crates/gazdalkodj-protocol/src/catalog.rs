use serde::Serialize;

/// Catalog id of the house; owning it waives the start upkeep.
pub const HOUSE: &str = "house";
/// Catalog id of the car; owning it enables car travel.
pub const CAR: &str = "car";

/// A purchasable item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShopItem {
    pub id: &'static str,
    pub name: &'static str,
    pub price: i64,
    /// Optional items do not count towards the win condition.
    pub optional: bool,
}

/// Everything the shops sell. Owning every non-optional item wins the game.
pub static PURCHASEABLE_ITEMS: &[ShopItem] = &[
    ShopItem {
        id: HOUSE,
        name: "House",
        price: 25_000_000,
        optional: false,
    },
    ShopItem {
        id: "kitchen-furniture",
        name: "Kitchen furniture",
        price: 1_500_000,
        optional: false,
    },
    ShopItem {
        id: "living-room-furniture",
        name: "Living room furniture",
        price: 1_800_000,
        optional: false,
    },
    ShopItem {
        id: "washing-machine",
        name: "Washing machine",
        price: 350_000,
        optional: false,
    },
    ShopItem {
        id: "fridge",
        name: "Fridge",
        price: 300_000,
        optional: false,
    },
    ShopItem {
        id: "television",
        name: "Television",
        price: 250_000,
        optional: true,
    },
    ShopItem {
        id: CAR,
        name: "Car",
        price: 6_000_000,
        optional: true,
    },
];

pub fn item(id: &str) -> Option<&'static ShopItem> {
    PURCHASEABLE_ITEMS.iter().find(|item| item.id == id)
}

/// Items a player must own to win.
pub fn required_items() -> impl Iterator<Item = &'static ShopItem> {
    PURCHASEABLE_ITEMS.iter().filter(|item| !item.optional)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_unique() {
        for (i, a) in PURCHASEABLE_ITEMS.iter().enumerate() {
            for b in &PURCHASEABLE_ITEMS[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn house_is_required_car_is_not() {
        assert!(required_items().any(|i| i.id == HOUSE));
        assert!(required_items().all(|i| i.id != CAR));
        assert_eq!(item(HOUSE).map(|i| i.price), Some(25_000_000));
        assert!(item("yacht").is_none());
    }
}
