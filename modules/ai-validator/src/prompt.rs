use domain::PricingAnomaly;

/// A single chat message in the wire format the model endpoint expects
/// (§6 "Model endpoint contract").
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

const SYSTEM_PROMPT: &str = "You are a pricing anomaly classifier. Given a \
product's detected price anomaly, decide whether it is a genuine pricing \
glitch worth alerting shoppers about, or a false positive (routine sale, \
stale scrape, or noise). Respond with a single JSON object only, no \
surrounding prose, with exactly these fields: \"is_glitch\" (boolean), \
\"confidence\" (integer 0-100), \"reasoning\" (short string), and \
\"glitch_type\" (one of \"decimal_error\", \"database_error\", \"clearance\", \
\"coupon_stack\", \"unknown\").";

/// §4.3 step 2: build the structured prompt for one anomaly.
pub fn build_prompt(anomaly: &PricingAnomaly) -> Vec<ChatMessage> {
    let product = &anomaly.product;
    let user_content = format!(
        "Product: {title}\nRetailer: {retailer}\nCategory: {category}\n\
         Current price: {current}\nOriginal price: {original}\n\
         Stock status: {stock:?}\nDetector signal: {anomaly_type:?}\n\
         Z-score: {z_score}\nDiscount percentage: {discount}\n\
         Detector confidence: {confidence}\nURL: {url}",
        title = product.title,
        retailer = product.retailer_id,
        category = product.category,
        current = product.current_price,
        original = product
            .original_price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown".into()),
        stock = product.stock_status,
        anomaly_type = anomaly.anomaly_type,
        z_score = anomaly
            .z_score
            .map(|z| z.to_string())
            .unwrap_or_else(|| "n/a".into()),
        discount = anomaly
            .discount_percentage
            .map(|d| format!("{d}%"))
            .unwrap_or_else(|| "n/a".into()),
        confidence = anomaly.initial_confidence,
        url = product.url,
    );

    vec![
        ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT.to_string(),
        },
        ChatMessage {
            role: "user",
            content: user_content,
        },
    ]
}
