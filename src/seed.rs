//! Fixture rows for the `products` table.
//!
//! The data is deliberately dirty: missing names and categories, category
//! spelling/casing variants (`Electroniks`, `clothing`, `CLOTHING`,
//! `Furnitures`), and NaN or missing prices and ratings. SQLite stores NaN as
//! NULL. Nothing downstream normalizes any of it.

/// `(id, name, category, price, rating)`
pub type ProductRow = (i64, Option<&'static str>, Option<&'static str>, Option<f64>, Option<f64>);

const NAN: Option<f64> = Some(f64::NAN);

pub const PRODUCTS: &[ProductRow] = &[
    (1, Some("Product A"), Some("Electronics"), Some(199.99), Some(4.2)),
    (2, Some("Product B"), Some("Clothing"), Some(49.99), Some(3.8)),
    (3, Some("Product C"), Some("Electroniks"), Some(299.99), Some(4.7)),
    (4, Some("Product D"), Some("Furniture"), Some(499.99), None),
    (5, Some("Product E"), Some("clothing"), Some(89.99), Some(3.5)),
    (6, None, Some("Furniture"), Some(899.99), Some(4.9)),
    (7, Some("Product G"), Some("Electronics"), Some(149.99), Some(4.0)),
    (8, Some("Product H"), Some("Electronics"), None, Some(2.8)),
    (9, Some("Product I"), Some("Clothing"), Some(39.99), Some(4.3)),
    (10, Some("Product J"), Some("Furnitures"), Some(599.99), Some(4.4)),
    (11, Some("Product A"), Some("Electronics"), Some(199.99), Some(4.2)),
    (12, Some("Product K"), Some("Clothing"), None, Some(3.7)),
    (13, Some("Product L"), None, Some(129.99), Some(4.1)),
    (14, None, Some("Clothing"), Some(59.99), Some(4.0)),
    (15, Some("Product M"), Some("Clothing"), NAN, Some(3.6)),
    (16, Some("Product N"), Some("CLOTHING"), Some(79.99), Some(3.9)),
    (17, Some("Product O"), Some("Electronics"), Some(249.99), None),
    (18, Some("Product P"), Some("Furniture"), NAN, Some(4.0)),
    (19, Some("Product Q"), Some("Furnitures"), Some(399.99), Some(4.5)),
    (20, Some("Product R"), None, Some(109.99), Some(4.1)),
    (21, Some("Product S"), Some("Electronics"), Some(139.99), NAN),
    (22, Some("Product T"), Some("Electronics"), NAN, Some(4.0)),
    (23, None, Some("Electronics"), Some(189.99), Some(3.6)),
    (24, Some("Product U"), Some("Furniture"), Some(209.99), Some(4.3)),
    (25, Some("Product V"), Some("Clothing"), Some(99.99), Some(3.5)),
    (26, Some("Product W"), Some("Clothing"), Some(49.99), None),
    (27, Some("Product X"), Some("Furniture"), Some(0.0), Some(2.0)),
    (28, Some("Product Y"), Some("Electroniks"), Some(179.99), Some(4.8)),
    (29, Some("Product Z"), Some("Furnitures"), NAN, Some(4.6)),
    (30, Some("Product AA"), Some("Electronics"), NAN, Some(4.1)),
    (31, Some("Product AB"), Some("Electronics"), None, Some(4.0)),
    (32, Some("Product AC"), Some("Clothing"), Some(89.99), None),
    (33, Some("Product AD"), Some("Clothing"), None, NAN),
    (34, Some("Product AE"), Some("clothing"), Some(69.99), Some(3.8)),
    (35, None, Some("Furniture"), Some(499.99), Some(4.2)),
    (36, Some("Product AF"), Some("Furniture"), Some(599.99), NAN),
    (37, Some("Product AG"), Some("Electronics"), Some(229.99), Some(4.9)),
    (38, Some("Product AH"), Some("Electronics"), Some(159.99), Some(4.5)),
    (39, Some("Product AI"), Some("Furnitures"), Some(339.99), NAN),
    (40, Some("Product AJ"), Some("Clothing"), NAN, Some(3.9)),
    (41, Some("Product AK"), Some("Electronics"), NAN, None),
    (42, None, Some("Clothing"), Some(119.99), Some(3.8)),
    (43, Some("Product AL"), None, Some(89.99), Some(4.0)),
    (44, Some("Product AM"), Some("Clothing"), Some(59.99), None),
    (45, Some("Product AN"), Some("Clothing"), None, Some(4.2)),
    (46, Some("Product AO"), Some("Clothing"), Some(89.99), NAN),
    (47, Some("Product AP"), Some("Furniture"), Some(419.99), Some(4.4)),
    (48, Some("Product AQ"), Some("Furnitures"), None, Some(4.3)),
    (49, Some("Product AR"), Some("Electroniks"), Some(129.99), Some(4.0)),
    (50, Some("Product AS"), Some("Clothing"), Some(59.99), Some(4.1)),
];
