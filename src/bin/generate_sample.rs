use anyhow::{Context, Result};
use serde_json::{json, Value};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[(self.next_u64() % items.len() as u64) as usize]
    }
}

const REGIONS: [&str; 4] = ["North", "South", "East", "West"];
const PRODUCTS: [(&str, f64); 5] = [
    ("Widget", 12.5),
    ("Gadget", 30.0),
    ("Gizmo", 7.25),
    ("Doohickey", 55.0),
    ("Thingamajig", 19.9),
];
const REASONS: [&str; 3] = ["Damaged", "Late delivery", "Wrong item"];

fn sales_rows(rng: &mut SimpleRng, count: usize) -> Vec<Value> {
    (1..=count)
        .map(|id| {
            let (product, price) = *rng.pick(&PRODUCTS);
            let quantity = 1 + (rng.next_u64() % 10) as i64;
            let day = 1 + rng.next_u64() % 28;
            let month = 1 + rng.next_u64() % 12;
            let amount = (price * quantity as f64 * (0.9 + 0.2 * rng.next_f64()) * 100.0).round() / 100.0;
            json!([
                id,
                format!("2019-{month:02}-{day:02}T00:00:00"),
                rng.pick(&REGIONS),
                product,
                quantity,
                amount
            ])
        })
        .collect()
}

fn returns_rows(rng: &mut SimpleRng, sales: usize) -> Vec<Value> {
    let returned: Vec<usize> = (1..=sales).filter(|_| rng.next_f64() < 0.08).collect();
    returned
        .into_iter()
        .enumerate()
        .map(|(i, order)| {
            let refund = if rng.next_f64() < 0.1 {
                Value::Null
            } else {
                json!((rng.next_f64() * 5000.0).round() / 100.0)
            };
            json!([i as i64 + 1, order, rng.pick(&REASONS), refund])
        })
        .collect()
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    let n_sales = 500;
    let sales = sales_rows(&mut rng, n_sales);
    let returns = returns_rows(&mut rng, n_sales);
    let n_returns = returns.len();

    let export = json!({
        "metadata": {
            "Version": 3,
            "Culture": "en-US",
            "CompatibilityLevel": 1550,
            "Description": "Sales & Returns sample"
        },
        "tables": [
            {
                "name": "Sales",
                "columns": [
                    { "name": "OrderId", "type": "int64" },
                    { "name": "OrderDate", "type": "datetime" },
                    { "name": "Region", "type": "string" },
                    { "name": "Product", "type": "string" },
                    { "name": "Quantity", "type": "int64" },
                    { "name": "Amount", "type": "double" }
                ],
                "rows": sales,
                "power_query": "let\n    Source = Csv.Document(File.Contents(\"sales.csv\"), [Delimiter=\",\"]),\n    Promoted = Table.PromoteHeaders(Source)\nin\n    Promoted"
            },
            {
                "name": "Returns",
                "columns": [
                    { "name": "ReturnId", "type": "int64" },
                    { "name": "OrderId", "type": "int64" },
                    { "name": "Reason", "type": "string" },
                    { "name": "Refund", "type": "double" }
                ],
                "rows": returns,
                "power_query": "let\n    Source = Sql.Database(\"sql01\", \"retail\"),\n    Returns = Source{[Schema=\"dbo\", Item=\"Returns\"]}[Data]\nin\n    Returns"
            },
            {
                "name": "Age",
                "columns": [{ "name": "Bucket", "type": "string" }],
                "rows": [["18-25"], ["26-40"], ["41-65"], ["65+"]],
                "dax": "DATATABLE(\"Bucket\", STRING, {{\"18-25\"}, {\"26-40\"}, {\"41-65\"}, {\"65+\"}})"
            }
        ],
        "measures": [
            { "table": "Sales", "name": "Total Sales", "expression": "SUM(Sales[Amount])", "display_folder": "KPI" },
            { "table": "Sales", "name": "Units", "expression": "SUM(Sales[Quantity])", "display_folder": "KPI" },
            {
                "table": "Returns",
                "name": "Return Rate",
                "expression": "DIVIDE(COUNTROWS(Returns), COUNTROWS(Sales))",
                "description": "Share of orders that were returned"
            }
        ]
    });

    let output_path = "sample_model.json";
    let text = serde_json::to_string_pretty(&export).context("serializing model export")?;
    std::fs::write(output_path, text).with_context(|| format!("writing {output_path}"))?;

    println!("Wrote {n_sales} sales and {n_returns} returns to {output_path}");
    Ok(())
}
