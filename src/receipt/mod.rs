//! Thermal receipt layout.
//!
//! A [`ReceiptDocument`] is laid out once in fixed-width columns and then
//! rendered either as plain text through the askama template or as an
//! ESC/POS byte stream.

pub mod escpos;

use askama::Template;
use chrono::FixedOffset;
use rust_decimal::Decimal;

use crate::filters;
use crate::models::{BillWithItems, Shop};
use crate::utils::{format_inr, format_percent, format_quantity, unit_label};

pub use escpos::EscPosBuilder;

/// 58mm paper.
pub const MIN_WIDTH: usize = 32;

const FOOTER_NOTE: &str = "Please retain this bill for any returns or exchanges.";

#[derive(Debug, Clone, Copy)]
pub struct ReceiptOptions {
    pub width: usize,
    pub offset: FixedOffset,
    /// Print Tamil names where available. Off for ESC/POS output.
    pub tamil: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptDocument {
    pub width: usize,
    /// Printed bold and double size on thermal printers, so kept unpadded.
    pub shop_name: String,
    pub header: Vec<String>,
    pub title: String,
    pub info: Vec<String>,
    pub items: Vec<String>,
    pub totals: Vec<String>,
    pub grand_total: String,
    pub payment: Vec<String>,
    pub footer: Vec<String>,
    pub gst_summary: Vec<String>,
}

#[derive(Template)]
#[template(path = "receipt.txt")]
struct ReceiptTemplate<'a> {
    doc: &'a ReceiptDocument,
}

fn width_of(s: &str) -> usize {
    s.chars().count()
}

fn truncate(s: &str, width: usize) -> String {
    s.chars().take(width).collect()
}

/// Greedy word wrap; words longer than `width` are cut.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let word = truncate(word, width);
        if current.is_empty() {
            current = word;
        } else if width_of(&current) + 1 + width_of(&word) <= width {
            current.push(' ');
            current.push_str(&word);
        } else {
            lines.push(std::mem::replace(&mut current, word));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn centered(text: &str, width: usize) -> Vec<String> {
    wrap(text, width)
        .into_iter()
        .map(|line| {
            let pad = (width - width_of(&line)) / 2;
            format!("{}{}", " ".repeat(pad), line)
        })
        .collect()
}

/// `left` flush left, `right` flush right. The left side gives way when
/// both do not fit.
fn pair(left: &str, right: &str, width: usize) -> String {
    let right = truncate(right, width);
    let room = width.saturating_sub(width_of(&right) + 1);
    let left = truncate(left, room);
    let gap = width - width_of(&left) - width_of(&right);
    format!("{}{}{}", left, " ".repeat(gap), right)
}

fn right_aligned(text: &str, width: usize) -> String {
    pair("", text, width)
}

const QTY_COL: usize = 9;
const RATE_COL: usize = 10;
const AMOUNT_COL: usize = 12;

fn item_columns(name: &str, qty: &str, rate: &str, amount: &str, width: usize) -> String {
    let name_col = width - QTY_COL - RATE_COL - AMOUNT_COL;
    format!(
        "{:<name_w$}{:>qty_w$}{:>rate_w$}{:>amount_w$}",
        truncate(name, name_col),
        truncate(qty, QTY_COL - 1),
        truncate(rate, RATE_COL - 1),
        truncate(amount, AMOUNT_COL - 1),
        name_w = name_col,
        qty_w = QTY_COL,
        rate_w = RATE_COL,
        amount_w = AMOUNT_COL,
    )
}

impl ReceiptDocument {
    pub fn build(shop: &Shop, bill: &BillWithItems, options: ReceiptOptions) -> Self {
        let width = options.width.max(MIN_WIDTH);
        let name_col = width - QTY_COL - RATE_COL - AMOUNT_COL;
        let record = &bill.bill;

        let mut header = Vec::new();
        if options.tamil {
            if let Some(tamil) = shop.name_tamil.as_deref().filter(|s| !s.is_empty()) {
                header.extend(centered(tamil, width));
            }
        }
        if let Some(address) = shop.address.as_deref().filter(|s| !s.is_empty()) {
            header.extend(centered(address, width));
        }
        if let Some(phone) = shop.phone.as_deref().filter(|s| !s.is_empty()) {
            header.extend(centered(&format!("Tel: {}", phone), width));
        }
        let gstin = shop.gstin.as_deref().filter(|s| !s.trim().is_empty());
        if let Some(gstin) = gstin {
            header.extend(centered(&format!("GSTIN: {}", gstin), width));
        }

        let issued = record
            .created_at
            .with_timezone(&options.offset)
            .format("%d %b %Y %I:%M %p")
            .to_string();
        let mut info = vec![
            pair("Bill No:", &record.bill_number, width),
            pair("Date:", &issued, width),
        ];
        if let Some(name) = record.customer_name.as_deref().filter(|s| !s.is_empty()) {
            info.push(pair("Customer:", name, width));
        }
        if let Some(phone) = record.customer_phone.as_deref().filter(|s| !s.is_empty()) {
            info.push(pair("Phone:", phone, width));
        }

        let mut items = vec![
            item_columns("Item", "Qty", "Rate", "Amount", width),
            "-".repeat(width),
        ];
        for item in &bill.items {
            let name = options
                .tamil
                .then_some(item.product_name_tamil.as_deref())
                .flatten()
                .filter(|s| !s.is_empty())
                .unwrap_or(item.product_name.as_str());
            let qty = format!("{} {}", format_quantity(item.quantity), unit_label(&item.unit));
            let rate = format_inr(item.unit_price);
            let amount = format_inr(item.quantity * item.unit_price);

            if width_of(name) > name_col {
                items.extend(wrap(name, width));
                items.push(item_columns("", &qty, &rate, &amount, width));
            } else {
                items.push(item_columns(name, &qty, &rate, &amount, width));
            }
            if item.gst_percent > Decimal::ZERO {
                items.push(right_aligned(
                    &format!(
                        "GST @{}%: {}",
                        format_percent(item.gst_percent),
                        format_inr(item.gst_amount)
                    ),
                    width,
                ));
            }
        }

        let mut totals = vec![pair("Subtotal:", &format_inr(record.subtotal), width)];
        if record.discount_amount > Decimal::ZERO {
            totals.push(pair(
                &format!("Discount ({}%):", format_percent(record.discount_percent)),
                &format!("-{}", format_inr(record.discount_amount)),
                width,
            ));
        }
        totals.push(pair("Taxable Amount:", &format_inr(record.taxable_amount), width));
        totals.push(pair("GST:", &format_inr(record.gst_amount), width));

        let grand_total = pair("TOTAL:", &format!("Rs. {}", format_inr(record.total)), width);
        let payment = vec![pair(
            "Payment Method:",
            &record.payment_method.label().to_uppercase(),
            width,
        )];

        let mut footer = centered("Thank you for your purchase!", width);
        footer.extend(centered(FOOTER_NOTE, width));
        footer.extend(centered("*** Powered by Kanaku360 ***", width));

        let mut gst_summary = Vec::new();
        if record.gst_amount > Decimal::ZERO && gstin.is_some() {
            let half = format_inr(record.gst_amount / Decimal::TWO);
            gst_summary.extend(centered("GST Summary", width));
            gst_summary.push(pair("CGST:", &half, width));
            gst_summary.push(pair("SGST:", &half, width));
        }

        Self {
            width,
            shop_name: shop.name.clone(),
            header,
            title: centered("TAX INVOICE", width).concat(),
            info,
            items,
            totals,
            grand_total,
            payment,
            footer,
            gst_summary,
        }
    }

    pub fn render_text(&self) -> Result<String, askama::Error> {
        let shop_name = centered(&self.shop_name, self.width).join("\n");
        let doc = ReceiptDocument {
            shop_name,
            ..self.clone()
        };
        ReceiptTemplate { doc: &doc }.render()
    }

    pub fn render_escpos(&self) -> Vec<u8> {
        let mut out = EscPosBuilder::new(self.width);

        out.center().bold().double_size().line(&self.shop_name).reset_size().bold_off();
        for line in &self.header {
            out.line(line.trim());
        }
        out.left().sep('-');
        out.center().bold().line(self.title.trim()).bold_off().left().sep('-');

        for section in [&self.info, &self.items] {
            for line in section {
                out.line(line);
            }
            out.sep('-');
        }
        for line in &self.totals {
            out.line(line);
        }
        out.sep('=').bold().line(&self.grand_total).bold_off().sep('-');
        for line in &self.payment {
            out.line(line);
        }
        out.sep('-');
        for line in &self.footer {
            out.line(line);
        }
        if !self.gst_summary.is_empty() {
            out.sep('-');
            for line in &self.gst_summary {
                out.line(line);
            }
        }

        out.cut_feed(4);
        out.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bill, BillItem, PaymentMethod, PaymentStatus};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn shop(gstin: Option<&str>) -> Shop {
        let now = Utc::now();
        Shop {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Sri Murugan Stores".to_string(),
            name_tamil: Some("ஸ்ரீ முருகன் ஸ்டோர்ஸ்".to_string()),
            address: Some("12 Car Street, Madurai".to_string()),
            phone: Some("9876543210".to_string()),
            email: None,
            gstin: gstin.map(str::to_string),
            logo_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn bill(discount_percent: Decimal, gst_percent: Decimal) -> BillWithItems {
        let bill_id = Uuid::new_v4();
        let created_at = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        let gross = dec!(2) * dec!(1250);
        let multiplier = Decimal::ONE - discount_percent / Decimal::ONE_HUNDRED;
        let taxable = gross * multiplier;
        let gst = gross * gst_percent / Decimal::ONE_HUNDRED * multiplier;
        let item = BillItem {
            id: Uuid::new_v4(),
            bill_id,
            product_id: Some(Uuid::new_v4()),
            product_name: "Filter Coffee Powder Premium Blend 500g".to_string(),
            product_name_tamil: Some("காபி தூள்".to_string()),
            sku: None,
            hsn_code: None,
            quantity: dec!(2),
            unit: "pcs".to_string(),
            unit_price: dec!(1250),
            discount_amount: gross - taxable,
            taxable_amount: taxable,
            gst_percent,
            gst_amount: gst,
            total: taxable + gst,
            position: 0,
            created_at,
        };
        BillWithItems {
            bill: Bill {
                id: bill_id,
                shop_id: Uuid::new_v4(),
                bill_number: "INV-000042".to_string(),
                customer_name: Some("Meena".to_string()),
                customer_phone: None,
                customer_address: None,
                price_type_id: None,
                subtotal: gross,
                discount_amount: gross - taxable,
                discount_percent,
                taxable_amount: taxable,
                gst_amount: gst,
                total: taxable + gst,
                payment_method: PaymentMethod::Upi,
                payment_status: PaymentStatus::Paid,
                notes: None,
                created_by: Uuid::new_v4(),
                created_at,
            },
            items: vec![item],
        }
    }

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn options(tamil: bool) -> ReceiptOptions {
        ReceiptOptions {
            width: 48,
            offset: ist(),
            tamil,
        }
    }

    #[test]
    fn ascii_lines_fit_the_paper() {
        let doc = ReceiptDocument::build(&shop(Some("33ABCDE1234F1Z5")), &bill(dec!(10), dec!(18)), options(false));
        let text = doc.render_text().unwrap();

        for line in text.lines() {
            assert!(line.chars().count() <= 48, "too wide: {line:?}");
        }
        assert!(text.contains("INV-000042"));
        assert!(text.contains("Please retain this bill for any returns or"));
        assert!(text.contains("GSTIN: 33ABCDE1234F1Z5"));
        assert!(text.contains("UPI"));
    }

    #[test]
    fn dates_print_in_shop_time() {
        let doc = ReceiptDocument::build(&shop(None), &bill(dec!(0), dec!(0)), options(false));
        assert!(doc.info[1].ends_with("11 Mar 2024 01:30 AM"));
    }

    #[test]
    fn amounts_use_indian_grouping() {
        let doc = ReceiptDocument::build(&shop(None), &bill(dec!(0), dec!(0)), options(false));
        assert!(doc.items.iter().any(|l| l.ends_with("2,500.00")));
        assert!(doc.grand_total.ends_with("Rs. 2,500.00"));
    }

    #[test]
    fn discount_line_only_when_discounted() {
        let plain = ReceiptDocument::build(&shop(None), &bill(dec!(0), dec!(5)), options(false));
        assert!(!plain.totals.iter().any(|l| l.starts_with("Discount")));

        let discounted = ReceiptDocument::build(&shop(None), &bill(dec!(10), dec!(5)), options(false));
        let line = discounted.totals.iter().find(|l| l.starts_with("Discount")).unwrap();
        assert!(line.starts_with("Discount (10%):"));
        assert!(line.ends_with("-250.00"));
    }

    #[test]
    fn gst_split_needs_gst_and_gstin() {
        let with_gstin = ReceiptDocument::build(&shop(Some("33ABCDE1234F1Z5")), &bill(dec!(0), dec!(18)), options(false));
        assert_eq!(with_gstin.gst_summary.len(), 3);
        assert!(with_gstin.gst_summary[1].ends_with("225.00"));
        assert!(with_gstin.items.iter().any(|l| l.trim_start() == "GST @18%: 450.00"));

        let without_gstin = ReceiptDocument::build(&shop(None), &bill(dec!(0), dec!(18)), options(false));
        assert!(without_gstin.gst_summary.is_empty());

        let zero_gst = ReceiptDocument::build(&shop(Some("33ABCDE1234F1Z5")), &bill(dec!(0), dec!(0)), options(false));
        assert!(zero_gst.gst_summary.is_empty());
        assert!(!zero_gst.items.iter().any(|l| l.contains("GST @")));
    }

    #[test]
    fn tamil_names_replace_english_when_enabled() {
        let tamil = ReceiptDocument::build(&shop(None), &bill(dec!(0), dec!(0)), options(true));
        assert!(tamil.items[2].starts_with("காபி தூள்"));
        assert!(tamil.header[0].contains("முருகன்"));

        let english = ReceiptDocument::build(&shop(None), &bill(dec!(0), dec!(0)), options(false));
        assert!(english.items[2].starts_with("Filter Coffee"));
    }

    #[test]
    fn escpos_output_is_framed() {
        let doc = ReceiptDocument::build(&shop(Some("33ABCDE1234F1Z5")), &bill(dec!(0), dec!(18)), options(false));
        let bytes = doc.render_escpos();
        assert_eq!(&bytes[..2], &[0x1B, 0x40]);
        assert_eq!(&bytes[bytes.len() - 4..], &[0x1D, 0x56, 0x42, 4]);
        assert!(bytes.windows(18).any(|w| w == b"Sri Murugan Stores"));
    }
}
