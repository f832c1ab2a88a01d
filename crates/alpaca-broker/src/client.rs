use crate::models::*;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use broker_trait::{
    BrokerAccount, BrokerBar, BrokerClient, BrokerClock, BrokerOrder, BrokerOrderRequest,
    BrokerOrderRequestNotional, BrokerOrderSide, BrokerPosition, BrokerQuote,
};
use reqwest::{header, Client};
use rust_decimal::Decimal;
use std::time::Duration;

const DATA_BASE_URL: &str = "https://data.alpaca.markets";

pub struct AlpacaClient {
    client: Client,
    base_url: String,
    data_base_url: String,
    api_key: String,
    secret_key: String,
}

impl AlpacaClient {
    /// Create a new Alpaca client
    pub fn new(api_key: String, secret_key: String, base_url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;

        Ok(Self {
            client,
            base_url,
            data_base_url: DATA_BASE_URL.to_string(),
            api_key,
            secret_key,
        })
    }

    /// Create client from environment variables.
    /// Accepts both APCA_API_KEY_ID / APCA_API_SECRET_KEY (standard Alpaca names)
    /// and ALPACA_API_KEY / ALPACA_SECRET_KEY as fallbacks.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("APCA_API_KEY_ID")
            .or_else(|_| std::env::var("ALPACA_API_KEY"))
            .map_err(|_| anyhow!("APCA_API_KEY_ID (or ALPACA_API_KEY) not set"))?;
        let secret_key = std::env::var("APCA_API_SECRET_KEY")
            .or_else(|_| std::env::var("ALPACA_SECRET_KEY"))
            .map_err(|_| anyhow!("APCA_API_SECRET_KEY (or ALPACA_SECRET_KEY) not set"))?;
        let base_url = std::env::var("ALPACA_BASE_URL")
            .unwrap_or_else(|_| "https://paper-api.alpaca.markets".to_string());

        Self::new(api_key, secret_key, base_url)
    }

    /// Get authorization headers
    fn auth_headers(&self) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "APCA-API-KEY-ID",
            header::HeaderValue::from_str(&self.api_key)
                .expect("API key contains invalid header characters"),
        );
        headers.insert(
            "APCA-API-SECRET-KEY",
            header::HeaderValue::from_str(&self.secret_key)
                .expect("Secret key contains invalid header characters"),
        );
        headers
    }

    /// Get account information
    pub async fn get_account(&self) -> Result<Account> {
        let url = format!("{}/v2/account", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers())
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Alpaca API error: {}", error_text));
        }

        let account = response.json::<Account>().await?;
        Ok(account)
    }

    /// Submit an order
    pub async fn submit_order(&self, order: OrderRequest) -> Result<Order> {
        let url = format!("{}/v2/orders", self.base_url);

        tracing::info!("Submitting order to Alpaca: {:?}", order);

        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers())
            .json(&order)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Alpaca order failed: {}", error_text));
        }

        let order_response = response.json::<Order>().await?;
        tracing::info!("Order submitted successfully: {}", order_response.id);
        Ok(order_response)
    }

    /// Submit a market order (convenience method)
    pub async fn submit_market_order(&self, order: MarketOrderRequest) -> Result<Order> {
        self.submit_order(order.to_order_request()).await
    }

    /// Get an order by ID
    pub async fn get_order(&self, order_id: &str) -> Result<Order> {
        let url = format!("{}/v2/orders/{}", self.base_url, order_id);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers())
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Failed to get order: {}", error_text));
        }

        let order = response.json::<Order>().await?;
        Ok(order)
    }

    /// Get all orders
    pub async fn get_orders(&self, limit: Option<usize>) -> Result<Vec<Order>> {
        let mut url = format!("{}/v2/orders?status=all", self.base_url);
        if let Some(lim) = limit {
            url.push_str(&format!("&limit={}", lim));
        }

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers())
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Failed to get orders: {}", error_text));
        }

        let orders = response.json::<Vec<Order>>().await?;
        Ok(orders)
    }

    /// Cancel an order
    pub async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let url = format!("{}/v2/orders/{}", self.base_url, order_id);

        let response = self
            .client
            .delete(&url)
            .headers(self.auth_headers())
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Failed to cancel order: {}", error_text));
        }

        tracing::info!("Order {} canceled successfully", order_id);
        Ok(())
    }

    /// Get all positions
    pub async fn get_positions(&self) -> Result<Vec<Position>> {
        let url = format!("{}/v2/positions", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers())
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Failed to get positions: {}", error_text));
        }

        let positions = response.json::<Vec<Position>>().await?;
        Ok(positions)
    }

    /// Get a specific position
    pub async fn get_position(&self, symbol: &str) -> Result<Option<Position>> {
        let url = format!("{}/v2/positions/{}", self.base_url, symbol);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers())
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Failed to get position: {}", error_text));
        }

        let position = response.json::<Position>().await?;
        Ok(Some(position))
    }

    /// Close a position (sell all shares)
    pub async fn close_position(&self, symbol: &str) -> Result<Order> {
        let url = format!("{}/v2/positions/{}", self.base_url, symbol);

        let response = self
            .client
            .delete(&url)
            .headers(self.auth_headers())
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Failed to close position: {}", error_text));
        }

        let order = response.json::<Order>().await?;
        tracing::info!("Position {} closed successfully", symbol);
        Ok(order)
    }

    /// Submit a notional (dollar-denominated) market order
    pub async fn submit_notional_order(&self, order: NotionalOrderRequest) -> Result<Order> {
        self.submit_order(order.to_order_request()).await
    }

    /// Daily bars for a symbol, most recent `limit` bars
    pub async fn get_bars(&self, symbol: &str, limit: usize) -> Result<Vec<Bar>> {
        let url = format!(
            "{}/v2/stocks/{}/bars?timeframe=1Day&limit={}",
            self.data_base_url, symbol, limit
        );

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers())
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Failed to get bars for {}: {}", symbol, error_text));
        }

        let parsed = response.json::<BarsResponse>().await?;
        Ok(parsed.bars.unwrap_or_default())
    }

    /// Latest quote for a symbol; falls back to the latest trade price if no quote is published
    pub async fn get_latest_quote(&self, symbol: &str) -> Result<Quote> {
        let url = format!(
            "{}/v2/stocks/{}/quotes/latest",
            self.data_base_url, symbol
        );

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers())
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "Failed to get latest quote for {}: {}",
                symbol,
                error_text
            ));
        }

        let parsed = response.json::<LatestQuoteResponse>().await?;
        Ok(parsed.quote)
    }

    /// Latest trade price for a symbol
    pub async fn get_latest_trade(&self, symbol: &str) -> Result<Trade> {
        let url = format!(
            "{}/v2/stocks/{}/trades/latest",
            self.data_base_url, symbol
        );

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers())
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "Failed to get latest trade for {}: {}",
                symbol,
                error_text
            ));
        }

        let parsed = response.json::<LatestTradeResponse>().await?;
        Ok(parsed.trade)
    }

    /// Market clock
    pub async fn get_clock(&self) -> Result<Clock> {
        let url = format!("{}/v2/clock", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers())
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Failed to get clock: {}", error_text));
        }

        let clock = response.json::<Clock>().await?;
        Ok(clock)
    }

    /// Check if trading is available
    pub async fn is_trading_available(&self) -> Result<bool> {
        let account = self.get_account().await?;
        Ok(!account.trading_blocked && !account.account_blocked)
    }

    /// Check if this client is connected to the paper trading environment
    pub fn is_paper(&self) -> bool {
        self.base_url.contains("paper-api")
    }

    /// Get the base URL (for logging/diagnostics)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

// ---------------------------------------------------------------------------
// Conversion helpers: Alpaca types -> unified BrokerClient types
// ---------------------------------------------------------------------------

fn account_to_broker(a: Account) -> BrokerAccount {
    BrokerAccount {
        id: a.id,
        account_number: a.account_number,
        status: a.status,
        currency: a.currency,
        buying_power: a.buying_power,
        cash: a.cash,
        portfolio_value: a.portfolio_value,
        pattern_day_trader: a.pattern_day_trader,
        trading_blocked: a.trading_blocked,
        daytrade_count: a.daytrade_count,
    }
}

fn position_to_broker(p: Position) -> BrokerPosition {
    BrokerPosition {
        symbol: p.symbol,
        qty: p.qty,
        side: p.side,
        avg_entry_price: p.avg_entry_price,
        market_value: p.market_value,
        cost_basis: p.cost_basis,
        unrealized_pl: p.unrealized_pl,
        unrealized_plpc: p.unrealized_plpc,
        unrealized_intraday_pl: p.unrealized_intraday_pl,
        current_price: p.current_price,
        lastday_price: p.lastday_price,
        change_today: p.change_today,
    }
}

fn order_to_broker(o: Order) -> BrokerOrder {
    BrokerOrder {
        id: o.id,
        client_order_id: o.client_order_id,
        created_at: o.created_at,
        filled_at: o.filled_at,
        symbol: o.symbol,
        qty: o.quantity,
        filled_qty: o.filled_quantity,
        filled_avg_price: o.filled_avg_price,
        order_type: o.order_type,
        side: o.side,
        status: o.status,
    }
}

#[async_trait]
impl BrokerClient for AlpacaClient {
    async fn get_account(&self) -> Result<BrokerAccount> {
        self.get_account().await.map(account_to_broker)
    }

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>> {
        self.get_positions()
            .await
            .map(|ps| ps.into_iter().map(position_to_broker).collect())
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<BrokerPosition>> {
        self.get_position(symbol)
            .await
            .map(|p| p.map(position_to_broker))
    }

    async fn submit_market_order(&self, order: BrokerOrderRequest) -> Result<BrokerOrder> {
        let side = match order.side {
            BrokerOrderSide::Buy => OrderSide::Buy,
            BrokerOrderSide::Sell => OrderSide::Sell,
        };
        let alpaca_order = MarketOrderRequest {
            symbol: order.symbol,
            qty: order.qty,
            side,
        };
        self.submit_market_order(alpaca_order)
            .await
            .map(order_to_broker)
    }

    async fn submit_notional_order(
        &self,
        order: BrokerOrderRequestNotional,
    ) -> Result<BrokerOrder> {
        let side = match order.side {
            BrokerOrderSide::Buy => OrderSide::Buy,
            BrokerOrderSide::Sell => OrderSide::Sell,
        };
        let alpaca_order = NotionalOrderRequest {
            symbol: order.symbol,
            notional: order.notional.to_string(),
            side,
        };
        self.submit_notional_order(alpaca_order)
            .await
            .map(order_to_broker)
    }

    async fn get_bars(&self, symbol: &str, limit: usize) -> Result<Vec<BrokerBar>> {
        let bars = self.get_bars(symbol, limit).await?;
        Ok(bars
            .into_iter()
            .map(|b| BrokerBar {
                timestamp: b.timestamp,
                open: Decimal::try_from(b.open).unwrap_or_default(),
                high: Decimal::try_from(b.high).unwrap_or_default(),
                low: Decimal::try_from(b.low).unwrap_or_default(),
                close: Decimal::try_from(b.close).unwrap_or_default(),
                volume: b.volume,
            })
            .collect())
    }

    async fn get_latest_quote(&self, symbol: &str) -> Result<BrokerQuote> {
        // Prefer the bid/ask quote; fall back to the last trade price if the
        // quote has no ask (e.g. thinly traded names right at the open).
        let quote = self.get_latest_quote(symbol).await?;
        let last = if quote.ask_price > 0.0 {
            quote.ask_price
        } else if let Ok(trade) = self.get_latest_trade(symbol).await {
            trade.price
        } else {
            quote.ask_price
        };
        Ok(BrokerQuote {
            symbol: symbol.to_string(),
            bid: Decimal::try_from(quote.bid_price).unwrap_or_default(),
            ask: Decimal::try_from(quote.ask_price).unwrap_or_default(),
            last: Decimal::try_from(last).unwrap_or_default(),
            timestamp: quote.timestamp,
        })
    }

    async fn get_clock(&self) -> Result<BrokerClock> {
        let clock = self.get_clock().await?;
        Ok(BrokerClock {
            timestamp: clock.timestamp,
            is_open: clock.is_open,
            next_open: clock.next_open,
            next_close: clock.next_close,
        })
    }

    async fn get_order(&self, order_id: &str) -> Result<BrokerOrder> {
        self.get_order(order_id).await.map(order_to_broker)
    }

    async fn get_orders(&self, limit: Option<usize>) -> Result<Vec<BrokerOrder>> {
        self.get_orders(limit)
            .await
            .map(|os| os.into_iter().map(order_to_broker).collect())
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        self.cancel_order(order_id).await
    }

    async fn close_position(&self, symbol: &str) -> Result<BrokerOrder> {
        self.close_position(symbol).await.map(order_to_broker)
    }

    fn is_paper(&self) -> bool {
        self.is_paper()
    }

    fn broker_name(&self) -> &str {
        "alpaca"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[tokio::test]
    #[ignore] // Only run with valid credentials
    async fn test_get_account() {
        let client = AlpacaClient::from_env().unwrap();
        let account = client.get_account().await.unwrap();

        println!("Account ID: {}", account.id);
        println!("Buying Power: ${}", account.buying_power);
        println!("Portfolio Value: ${}", account.portfolio_value);

        assert!(!account.id.is_empty());
    }

    #[tokio::test]
    #[ignore] // Only run with valid credentials
    async fn test_submit_market_order() {
        let client = AlpacaClient::from_env().unwrap();

        // Submit a small test order
        let order = MarketOrderRequest::buy("AAPL", Decimal::from_str("1.0").unwrap());
        let result = client.submit_market_order(order).await.unwrap();

        println!("Order submitted: {}", result.id);
        println!("Status: {}", result.status);

        // Cancel the order immediately (for paper trading)
        client.cancel_order(&result.id).await.unwrap();
    }
}
