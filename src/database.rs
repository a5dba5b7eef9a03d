use sqlx::{postgres::PgPoolOptions, PgConnection, Pool, Postgres};
use uuid::Uuid;

pub type Database = Pool<Postgres>;

pub async fn create_database_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<Database, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    // Test the connection
    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    log::info!("Connected to database and applied migrations");
    Ok(pool)
}

/// Kinds of numbered documents a shop issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Bill,
    PurchaseOrder,
}

impl DocumentKind {
    fn key(self) -> &'static str {
        match self {
            DocumentKind::Bill => "bill",
            DocumentKind::PurchaseOrder => "purchase_order",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            DocumentKind::Bill => "INV",
            DocumentKind::PurchaseOrder => "PO",
        }
    }

    pub fn format_number(self, sequence: i64) -> String {
        format!("{}-{:06}", self.prefix(), sequence)
    }
}

/// Claims the next number for `kind` in `shop_id`.
///
/// The counter row is upserted and bumped in a single statement so two
/// checkouts in the same shop never see the same value.
pub async fn next_document_number(
    conn: &mut PgConnection,
    shop_id: Uuid,
    kind: DocumentKind,
) -> Result<String, sqlx::Error> {
    let sequence = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO document_sequences (shop_id, kind, last_value)
        VALUES ($1, $2, 1)
        ON CONFLICT (shop_id, kind)
        DO UPDATE SET last_value = document_sequences.last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(shop_id)
    .bind(kind.key())
    .fetch_one(conn)
    .await?;

    Ok(kind.format_number(sequence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_bill_and_po_numbers() {
        assert_eq!(DocumentKind::Bill.format_number(1), "INV-000001");
        assert_eq!(DocumentKind::PurchaseOrder.format_number(42), "PO-000042");
        assert_eq!(DocumentKind::Bill.format_number(1_234_567), "INV-1234567");
    }
}
