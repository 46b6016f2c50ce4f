//! Wire-frame parsing tests against realistic Binance payloads

use binance_orderflow::{data::TradeSide, parser::BinanceDataParser};
use rust_decimal_macros::dec;

#[test]
fn test_parse_live_depth_frame() {
    // Shape of a real <symbol>@depth@100ms frame
    let json = r#"{
        "e": "depthUpdate",
        "E": 1700000001234,
        "s": "ETHUSDT",
        "U": 33203620100,
        "u": 33203620115,
        "b": [
            ["2010.45", "12.3410"],
            ["2010.44", "0.0000"],
            ["2010.40", "5.0000"]
        ],
        "a": [
            ["2010.46", "8.0000"],
            ["2010.50", "0.0000"]
        ]
    }"#;

    let diff = BinanceDataParser::new().parse_diff(json).unwrap();
    assert_eq!(diff.first_update_id, 33203620100);
    assert_eq!(diff.final_update_id, 33203620115);
    assert_eq!(diff.bids.len(), 3);
    assert_eq!(diff.bids[0], (dec!(2010.45), dec!(12.3410)));
    assert!(diff.bids[1].1.is_zero());
    assert_eq!(diff.asks[1], (dec!(2010.50), dec!(0)));
}

#[test]
fn test_parse_live_trade_frame() {
    // Shape of a real <symbol>@trade frame
    let json = r#"{
        "e": "trade",
        "E": 1700000001234,
        "s": "ETHUSDT",
        "t": 1234567890,
        "p": "2010.45",
        "q": "0.2500",
        "T": 1700000001230,
        "m": true,
        "M": true
    }"#;

    let trade = BinanceDataParser::new().parse_trade(json).unwrap();
    assert_eq!(trade.price, dec!(2010.45));
    assert_eq!(trade.size, dec!(0.25));
    // Buyer was maker: the aggressor sold
    assert_eq!(trade.side, TradeSide::Sell);
    assert_eq!(trade.timestamp_ms, 1700000001230);
}

#[test]
fn test_parse_rest_snapshot_body() {
    let json = r#"{
        "lastUpdateId": 33203620099,
        "bids": [["2010.45", "12.34"], ["2010.40", "5.00"]],
        "asks": [["2010.46", "8.00"]]
    }"#;

    let snapshot = BinanceDataParser::new().parse_snapshot(json).unwrap();
    assert_eq!(snapshot.last_update_id, 33203620099);
    assert_eq!(snapshot.bids.len(), 2);
    assert_eq!(snapshot.asks.len(), 1);
}

#[test]
fn test_diff_missing_sequence_ids_rejected() {
    let json = r#"{"b": [["2010.45", "1"]], "a": []}"#;
    assert!(BinanceDataParser::new().parse_diff(json).is_err());
}

#[test]
fn test_non_numeric_price_rejected() {
    let parser = BinanceDataParser::new();

    let diff = r#"{"U": 1, "u": 2, "b": [["garbage", "1"]], "a": []}"#;
    assert!(parser.parse_diff(diff).is_err());

    let trade = r#"{"p": "2010.45", "q": "not-a-qty", "m": false, "T": 1}"#;
    assert!(parser.parse_trade(trade).is_err());
}

#[test]
fn test_truncated_frame_rejected() {
    let parser = BinanceDataParser::new();
    assert!(parser.parse_diff(r#"{"U": 1, "u": 2, "b": [["2010"#).is_err());
    assert!(parser.parse_trade("").is_err());
    assert!(parser.parse_snapshot("[]").is_err());
}

#[test]
fn test_empty_sides_are_valid() {
    let json = r#"{"U": 5, "u": 5, "b": [], "a": []}"#;
    let diff = BinanceDataParser::new().parse_diff(json).unwrap();
    assert!(diff.bids.is_empty());
    assert!(diff.asks.is_empty());
}
