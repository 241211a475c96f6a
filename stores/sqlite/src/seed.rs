use anyhow::Result;
use tracing::info;

use crate::sqlite_store::SqliteStore;

struct DemoProduct {
	name: &'static str,
	brand: &'static str,
	image: &'static str,
	/// (retailer index, price history oldest first); the last entry is current
	offers: &'static [(usize, &'static [f64])],
}

const RETAILERS: &[(&str, &str)] = &[
	("Shufersal", "Shufersal Deal Dizengoff"),
	("Rami Levy", "Rami Levy Talpiot"),
	("Hahishuk", "Hahishuk Online"),
];

const PRODUCTS: &[DemoProduct] = &[
	DemoProduct {
		name: "Milk 3%",
		brand: "Tnuva",
		image: "https://hahishook.com/product-image.jpg",
		offers: &[
			(0, &[6.2, 6.5]),
			(1, &[5.9]),
			(2, &[6.1, 5.9]),
		],
	},
	DemoProduct {
		name: "Milk 1%",
		brand: "Tara",
		image: "https://hahishook.com/milk-1.jpg",
		offers: &[
			(0, &[6.3]),
			(1, &[6.0]),
		],
	},
	DemoProduct {
		name: "Chocolate Milk",
		brand: "Yotvata",
		image: "https://hahishook.com/choco-milk.jpg",
		offers: &[(0, &[7.9, 7.4])],
	},
	DemoProduct {
		name: "White Bread",
		brand: "Angel",
		image: "https://hahishook.com/bread-image.jpg",
		offers: &[
			(1, &[7.2]),
			(2, &[7.5]),
		],
	},
	DemoProduct {
		name: "Eggs 12 Pack",
		brand: "Tnuva",
		image: "https://hahishook.com/eggs-image.jpg",
		offers: &[
			(0, &[13.5]),
			(2, &[12.9]),
		],
	},
	DemoProduct {
		name: "Basmati Rice",
		brand: "Sugat",
		image: "https://hahishook.com/rice.jpg",
		offers: &[(2, &[14.9, 12.9])],
	},
];

impl SqliteStore {
	/// Populate a small catalog with price history. Does nothing when the
	/// store already holds products.
	pub async fn seed_demo_data(&self) -> Result<()> {
		if self.product_count().await? > 0 {
			info!("Catalog already populated, skipping demo data");
			return Ok(());
		}

		let mut retailers = Vec::with_capacity(RETAILERS.len());
		for (retailer, branch) in RETAILERS {
			let retailer_id = self.insert_retailer(retailer).await?;
			let store_id = self.insert_store(retailer_id, branch).await?;
			retailers.push((retailer_id, store_id));
		}

		let mut prices = 0;
		for demo in PRODUCTS {
			let product = self.insert_product(demo.name, Some(demo.brand), Some(demo.image)).await?;

			for (retailer_index, history) in demo.offers {
				let Some(&(retailer_id, store_id)) = retailers.get(*retailer_index) else {
					continue;
				};
				let listing = self.insert_listing(product.id, store_id, retailer_id).await?;

				for price in history.iter() {
					self.record_price(listing.id, *price).await?;
					prices += 1;
				}
			}
		}

		info!("Seeded {} products and {} prices", PRODUCTS.len(), prices);
		Ok(())
	}
}
