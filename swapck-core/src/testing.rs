//! In-memory sources shared by the unit tests.

use async_trait::async_trait;
use compact_str::CompactString;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use swapck_sdk::objects::{
    AddBillingAddressRequest, BuildRequest, BuiltTransaction, Call, FieldCollection, Felt,
    PaymentType, Quote, QuoteId, QuoteRequest, Session, SessionStatus, Token, TokenList, U256,
};

use crate::sources::{BalanceSource, QuoteSource, SessionSource, SourceError, WalletConnector};

pub const ROUTER: u64 = 0xf00;
pub const DEPOSIT: u64 = 0xd0;
pub const BUYER: u64 = 0xb0b;

fn token(address: u64, ticker: &str, decimals: u8) -> Token {
    Token {
        address: Felt::from(address),
        ticker: CompactString::new(ticker),
        decimals,
        icon: None,
    }
}

pub fn usdc() -> Token {
    token(0xa1, "USDC", 6)
}

pub fn eth() -> Token {
    token(0xb2, "ETH", 18)
}

pub fn strk() -> Token {
    token(0xc3, "STRK", 18)
}

pub fn token_list() -> TokenList {
    TokenList::new(vec![usdc(), eth(), strk()])
}

pub fn session(status: SessionStatus, total: Decimal) -> Session {
    Session {
        session_id: "cs_test".to_owned(),
        status,
        line_items: Vec::new(),
        total_price: total,
        total_price_token: CompactString::const_new("USDC"),
        deposit_address: Felt::from(DEPOSIT),
        success_url: "https://shop.example/ok".to_owned(),
        cancel_url: "https://shop.example/cancel".to_owned(),
        shipping_address_collection: FieldCollection::Optional,
        contact_information_collection: FieldCollection::Optional,
        payment_type: PaymentType::OneTime,
    }
}

/// Aggregator fake quoting fixed exchange rates.
#[derive(Default)]
pub struct FakeQuotes {
    rates: HashMap<(Felt, Felt), (U256, U256)>,
    failing: HashSet<Felt>,
    next_id: AtomicU64,
    issued: Mutex<HashMap<QuoteId, Quote>>,
    requests: Mutex<Vec<QuoteRequest>>,
    builds: Mutex<Vec<BuildRequest>>,
}

impl FakeQuotes {
    /// `buy = sell * num / den`
    pub fn with_rate(mut self, sell: Felt, buy: Felt, num: u64, den: u64) -> Self {
        self.rates
            .insert((sell, buy), (U256::from(num), U256::from(den)));
        self
    }

    pub fn failing(mut self, token: Felt) -> Self {
        self.failing.insert(token);
        self
    }

    pub fn requests(&self) -> Vec<QuoteRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn builds(&self) -> Vec<BuildRequest> {
        self.builds.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuoteSource for FakeQuotes {
    async fn quotes(&self, request: &QuoteRequest) -> Result<Vec<Quote>, SourceError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing.contains(&request.sell_token_address)
            || self.failing.contains(&request.buy_token_address)
        {
            return Err(SourceError::Unavailable("aggregator down".into()));
        }
        let Some((num, den)) = self
            .rates
            .get(&(request.sell_token_address, request.buy_token_address))
        else {
            return Ok(Vec::new());
        };
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let quote = Quote {
            quote_id: QuoteId(CompactString::new(format!("q-{id}"))),
            sell_token_address: request.sell_token_address,
            sell_amount: request.sell_amount,
            sell_amount_in_usd: None,
            buy_token_address: request.buy_token_address,
            buy_amount: request.sell_amount * *num / *den,
            buy_amount_in_usd: None,
            chain_id: None,
            expiry: None,
        };
        self.issued
            .lock()
            .unwrap()
            .insert(quote.quote_id.clone(), quote.clone());
        Ok(vec![quote])
    }

    async fn build(&self, request: &BuildRequest) -> Result<BuiltTransaction, SourceError> {
        self.builds.lock().unwrap().push(request.clone());
        let quote = self
            .issued
            .lock()
            .unwrap()
            .get(&request.quote_id)
            .cloned()
            .ok_or_else(|| SourceError::Unavailable(format!("unknown quote {}", request.quote_id)))?;
        let mut calls = Vec::new();
        if request.include_approve {
            calls.push(Call::approve(
                quote.sell_token_address,
                Felt::from(ROUTER),
                quote.sell_amount,
            ));
        }
        calls.push(Call {
            contract_address: Felt::from(ROUTER),
            entrypoint: CompactString::const_new("multi_route_swap"),
            calldata: vec![quote.sell_token_address, quote.buy_token_address],
        });
        Ok(BuiltTransaction {
            chain_id: None,
            calls,
        })
    }
}

#[derive(Default)]
pub struct FakeBalances {
    balances: HashMap<Felt, U256>,
    failing: HashSet<Felt>,
}

impl FakeBalances {
    pub fn with(mut self, token: Felt, balance: U256) -> Self {
        self.balances.insert(token, balance);
        self
    }

    pub fn failing(mut self, token: Felt) -> Self {
        self.failing.insert(token);
        self
    }
}

#[async_trait]
impl BalanceSource for FakeBalances {
    async fn balance_of(&self, token: Felt, _owner: Felt) -> Result<U256, SourceError> {
        if self.failing.contains(&token) {
            return Err(SourceError::Unavailable("rpc down".into()));
        }
        Ok(self.balances.get(&token).copied().unwrap_or_default())
    }
}

/// Backend fake replaying a scripted sequence of statuses. The last entry
/// repeats forever.
pub struct FakeSessions {
    session: Session,
    statuses: Mutex<VecDeque<Option<SessionStatus>>>,
    pub polls: AtomicUsize,
    pub billing: Mutex<Vec<AddBillingAddressRequest>>,
    pub invoices: Mutex<Vec<String>>,
    fail_billing: bool,
}

impl FakeSessions {
    pub fn new(session: Session) -> Self {
        let status = session.status;
        Self {
            session,
            statuses: Mutex::new(VecDeque::from([Some(status)])),
            polls: AtomicUsize::new(0),
            billing: Mutex::new(Vec::new()),
            invoices: Mutex::new(Vec::new()),
            fail_billing: false,
        }
    }

    /// `None` entries make the poll fail.
    pub fn with_statuses(self, statuses: impl IntoIterator<Item = Option<SessionStatus>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into_iter().collect();
        self
    }

    pub fn failing_billing(mut self) -> Self {
        self.fail_billing = true;
        self
    }
}

#[async_trait]
impl SessionSource for FakeSessions {
    async fn session(&self, _session_id: &str) -> Result<Session, SourceError> {
        Ok(self.session.clone())
    }

    async fn status(&self, _session_id: &str) -> Result<SessionStatus, SourceError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        let next = if statuses.len() > 1 {
            statuses.pop_front().flatten()
        } else {
            statuses.front().copied().flatten()
        };
        next.ok_or_else(|| SourceError::Unavailable("backend down".into()))
    }

    async fn add_billing_address(
        &self,
        request: &AddBillingAddressRequest,
    ) -> Result<(), SourceError> {
        if self.fail_billing {
            return Err(SourceError::Unavailable("backend down".into()));
        }
        self.billing.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn send_email_invoice(&self, session_id: &str) -> Result<(), SourceError> {
        self.invoices.lock().unwrap().push(session_id.to_owned());
        Ok(())
    }
}

pub struct FakeWallet {
    address: Felt,
    reject: bool,
    pub executed: Mutex<Vec<Vec<Call>>>,
}

impl FakeWallet {
    pub fn new() -> Self {
        Self {
            address: Felt::from(BUYER),
            reject: false,
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl WalletConnector for FakeWallet {
    async fn connect(&self) -> Result<Felt, SourceError> {
        Ok(self.address)
    }

    async fn disconnect(&self) {}

    fn address(&self) -> Option<Felt> {
        Some(self.address)
    }

    async fn execute(&self, calls: &[Call]) -> Result<String, SourceError> {
        if self.reject {
            return Err(SourceError::Rejected("user aborted".into()));
        }
        self.executed.lock().unwrap().push(calls.to_vec());
        Ok("0xfeed".to_owned())
    }
}
