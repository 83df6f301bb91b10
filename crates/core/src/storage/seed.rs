use crate::domain::stock::StockInput;

/// Sample watchlist used to bootstrap an empty store. One entry per market.
pub fn sample_stocks() -> Vec<StockInput> {
    vec![
        StockInput {
            code: "005930".into(),
            name: "삼성전자".into(),
            market: "KOSPI".into(),
            target_price: 80_000.0,
            stop_loss_percent: 10.0,
            target_profit_percent: 20.0,
            memo: Some("반도체 대장주".into()),
        },
        StockInput {
            code: "247540".into(),
            name: "에코프로비엠".into(),
            market: "KOSDAQ".into(),
            target_price: 180_000.0,
            stop_loss_percent: 8.0,
            target_profit_percent: 15.0,
            memo: Some("2차전지 양극재".into()),
        },
        StockInput {
            code: "AAPL".into(),
            name: "Apple".into(),
            market: "NASDAQ".into(),
            target_price: 190.0,
            stop_loss_percent: 12.0,
            target_profit_percent: 25.0,
            memo: Some("IT 플랫폼".into()),
        },
    ]
}
