//! Shared mocks and helpers for the session integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use tokio::sync::{broadcast, oneshot, watch, Semaphore};

use wallet_sync::config::ContractConfig;
use wallet_sync::session::{
    ConnectionStatus, ContractRpc, PendingTx, ProviderError, ProviderEvent, Session, SessionSink,
    SessionSnapshot, TxReceipt, WalletProvider, WatchSink,
};

pub const ETHER: u128 = 1_000_000_000_000_000_000;

pub fn alice() -> Address {
    Address::repeat_byte(0xa1)
}

pub fn bob() -> Address {
    Address::repeat_byte(0xb0)
}

pub fn ether(amount: u128) -> U256 {
    U256::from(amount * ETHER)
}

/// Poll `condition` until it holds, panicking after two seconds.
pub async fn eventually<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Let spawned tasks run for a moment.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

/// How `request_accounts` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Grant,
    Reject,
    Unavailable,
}

/// A balance query held until the test resolves it.
pub struct PendingFetch {
    pub account: Address,
    reply: oneshot::Sender<Result<U256, ProviderError>>,
}

impl PendingFetch {
    pub fn resolve(self, balance: U256) {
        let _ = self.reply.send(Ok(balance));
    }

    pub fn fail(self, reason: &str) {
        let _ = self.reply.send(Err(ProviderError::Rpc(reason.to_string())));
    }
}

/// Scriptable injected wallet.
pub struct MockWallet {
    accounts: Mutex<Vec<Address>>,
    authorized: AtomicBool,
    mode: Mutex<AccessMode>,
    chain_id: Mutex<u64>,
    request_delay: Mutex<Option<Duration>>,
    balances: Mutex<HashMap<Address, U256>>,
    balance_error: Mutex<Option<String>>,
    gate_balances: AtomicBool,
    pending: Mutex<Vec<PendingFetch>>,
    pub request_calls: AtomicUsize,
    pub eager_calls: AtomicUsize,
    pub balance_calls: AtomicUsize,
    events: broadcast::Sender<ProviderEvent>,
    blocks: broadcast::Sender<u64>,
}

impl MockWallet {
    pub fn new(accounts: Vec<Address>) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        let (blocks, _) = broadcast::channel(64);
        Arc::new(Self {
            accounts: Mutex::new(accounts),
            authorized: AtomicBool::new(false),
            mode: Mutex::new(AccessMode::Grant),
            chain_id: Mutex::new(31337),
            request_delay: Mutex::new(None),
            balances: Mutex::new(HashMap::new()),
            balance_error: Mutex::new(None),
            gate_balances: AtomicBool::new(false),
            pending: Mutex::new(Vec::new()),
            request_calls: AtomicUsize::new(0),
            eager_calls: AtomicUsize::new(0),
            balance_calls: AtomicUsize::new(0),
            events,
            blocks,
        })
    }

    /// Pretend the user granted access in an earlier visit.
    pub fn pre_authorize(&self) {
        self.authorized.store(true, Ordering::SeqCst);
    }

    pub fn set_mode(&self, mode: AccessMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    pub fn set_chain(&self, chain_id: u64) {
        *self.chain_id.lock().unwrap() = chain_id;
    }

    pub fn delay_requests(&self, delay: Duration) {
        *self.request_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_balance(&self, account: Address, balance: U256) {
        self.balances.lock().unwrap().insert(account, balance);
    }

    pub fn fail_balances(&self, reason: Option<&str>) {
        *self.balance_error.lock().unwrap() = reason.map(str::to_string);
    }

    /// Hold every balance query until resolved through [`take_fetches`].
    ///
    /// [`take_fetches`]: MockWallet::take_fetches
    pub fn gate_balances(&self) {
        self.gate_balances.store(true, Ordering::SeqCst);
    }

    pub fn pending_fetches(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn take_fetches(&self) -> Vec<PendingFetch> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    pub fn new_block(&self, number: u64) {
        let _ = self.blocks.send(number);
    }

    pub fn event_listeners(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn block_listeners(&self) -> usize {
        self.blocks.receiver_count()
    }

    pub fn requests(&self) -> usize {
        self.request_calls.load(Ordering::SeqCst)
    }

    pub fn balance_queries(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn eager_probes(&self) -> usize {
        self.eager_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.request_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mode = *self.mode.lock().unwrap();
        match mode {
            AccessMode::Grant => {
                self.authorized.store(true, Ordering::SeqCst);
                Ok(self.accounts.lock().unwrap().clone())
            }
            AccessMode::Reject => Err(ProviderError::Rejected("User rejected the request".into())),
            AccessMode::Unavailable => Err(ProviderError::Unavailable("extension not installed".into())),
        }
    }

    async fn eager_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.eager_calls.fetch_add(1, Ordering::SeqCst);
        if self.authorized.load(Ordering::SeqCst) {
            Ok(self.accounts.lock().unwrap().clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(*self.chain_id.lock().unwrap())
    }

    async fn get_balance(&self, account: Address) -> Result<U256, ProviderError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);

        if self.gate_balances.load(Ordering::SeqCst) {
            let (reply, rx) = oneshot::channel();
            self.pending.lock().unwrap().push(PendingFetch { account, reply });
            return rx
                .await
                .unwrap_or_else(|_| Err(ProviderError::Rpc("fetch dropped".into())));
        }

        if let Some(reason) = self.balance_error.lock().unwrap().clone() {
            return Err(ProviderError::Rpc(reason));
        }
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&account)
            .copied()
            .unwrap_or_default())
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn blocks(&self) -> broadcast::Receiver<u64> {
        self.blocks.subscribe()
    }
}

#[derive(Debug, Clone)]
enum Submitted {
    Deploy { greeting: Option<String> },
    Call { method: String, args: Vec<DynSolValue> },
}

/// In-memory Greeter contract.
pub struct MockContractRpc {
    address: Address,
    greeting: Mutex<Option<String>>,
    submitted: Mutex<HashMap<TxHash, Submitted>>,
    gated: AtomicBool,
    gate: Semaphore,
    deploy_error: Mutex<Option<String>>,
    send_error: Mutex<Option<String>>,
    revert_sends: AtomicBool,
    pub deploy_calls: AtomicUsize,
    pub call_calls: AtomicUsize,
    pub send_calls: AtomicUsize,
    nonce: AtomicUsize,
}

impl MockContractRpc {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            address: Address::repeat_byte(0xc0),
            greeting: Mutex::new(None),
            submitted: Mutex::new(HashMap::new()),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
            deploy_error: Mutex::new(None),
            send_error: Mutex::new(None),
            revert_sends: AtomicBool::new(false),
            deploy_calls: AtomicUsize::new(0),
            call_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
            nonce: AtomicUsize::new(0),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Hold confirmations until [`release`](MockContractRpc::release) is called.
    pub fn gate_confirmations(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self, confirmations: usize) {
        self.gate.add_permits(confirmations);
    }

    pub fn fail_deploy(&self, reason: &str) {
        *self.deploy_error.lock().unwrap() = Some(reason.to_string());
    }

    pub fn fail_send(&self, reason: &str) {
        *self.send_error.lock().unwrap() = Some(reason.to_string());
    }

    pub fn revert_sends(&self) {
        self.revert_sends.store(true, Ordering::SeqCst);
    }

    pub fn deploys(&self) -> usize {
        self.deploy_calls.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.call_calls.load(Ordering::SeqCst)
    }

    fn next_hash(&self) -> TxHash {
        let n = self.nonce.fetch_add(1, Ordering::SeqCst) + 1;
        TxHash::with_last_byte(n as u8)
    }
}

#[async_trait]
impl ContractRpc for MockContractRpc {
    async fn deploy(&self, args: &[DynSolValue], _from: Address) -> Result<PendingTx, ProviderError> {
        self.deploy_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.deploy_error.lock().unwrap().clone() {
            return Err(ProviderError::Rpc(reason));
        }

        let tx_hash = self.next_hash();
        let greeting = args.first().and_then(|v| v.as_str()).map(str::to_string);
        self.submitted
            .lock()
            .unwrap()
            .insert(tx_hash, Submitted::Deploy { greeting });
        Ok(PendingTx {
            tx_hash,
            contract_address: None,
        })
    }

    async fn call(
        &self,
        contract: Address,
        method: &str,
        _args: &[DynSolValue],
    ) -> Result<DynSolValue, ProviderError> {
        self.call_calls.fetch_add(1, Ordering::SeqCst);
        if contract != self.address {
            return Err(ProviderError::Rpc("no contract at address".into()));
        }
        match method {
            "greet" => Ok(DynSolValue::String(
                self.greeting.lock().unwrap().clone().unwrap_or_default(),
            )),
            other => Err(ProviderError::Rpc(format!("unknown method {}", other))),
        }
    }

    async fn send(
        &self,
        contract: Address,
        method: &str,
        args: &[DynSolValue],
        _from: Address,
    ) -> Result<PendingTx, ProviderError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.send_error.lock().unwrap().clone() {
            return Err(ProviderError::Rpc(reason));
        }
        if contract != self.address {
            return Err(ProviderError::Rpc("no contract at address".into()));
        }

        let tx_hash = self.next_hash();
        self.submitted.lock().unwrap().insert(
            tx_hash,
            Submitted::Call {
                method: method.to_string(),
                args: args.to_vec(),
            },
        );
        Ok(PendingTx {
            tx_hash,
            contract_address: None,
        })
    }

    async fn confirm(&self, tx: &PendingTx) -> Result<TxReceipt, ProviderError> {
        if self.gated.load(Ordering::SeqCst) {
            self.gate
                .acquire()
                .await
                .map_err(|_| ProviderError::Unavailable("gate closed".into()))?
                .forget();
        }

        let submitted = self
            .submitted
            .lock()
            .unwrap()
            .get(&tx.tx_hash)
            .cloned()
            .ok_or_else(|| ProviderError::Rpc("unknown transaction".into()))?;

        let mut receipt = TxReceipt {
            tx_hash: tx.tx_hash,
            block_number: Some(1),
            contract_address: None,
            success: true,
        };
        match submitted {
            Submitted::Deploy { greeting } => {
                *self.greeting.lock().unwrap() = greeting;
                receipt.contract_address = Some(self.address);
            }
            Submitted::Call { .. } if self.revert_sends.load(Ordering::SeqCst) => {
                receipt.success = false;
            }
            Submitted::Call { method, args } => {
                if method == "setGreeting" {
                    *self.greeting.lock().unwrap() =
                        args.first().and_then(|v| v.as_str()).map(str::to_string);
                }
            }
        }
        Ok(receipt)
    }
}

/// Sink that records every distinct connection status it is shown.
#[derive(Default)]
pub struct StatusLog {
    statuses: Mutex<Vec<ConnectionStatus>>,
}

impl StatusLog {
    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        self.statuses.lock().unwrap().clone()
    }
}

impl SessionSink for StatusLog {
    fn publish(&self, snapshot: &SessionSnapshot) {
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.last() != Some(&snapshot.connection_status) {
            statuses.push(snapshot.connection_status);
        }
    }
}

/// A session wired to fresh mocks.
pub struct Harness {
    pub session: Session,
    pub wallet: Arc<MockWallet>,
    pub rpc: Arc<MockContractRpc>,
    pub snapshots: watch::Receiver<SessionSnapshot>,
}

impl Harness {
    pub fn new(accounts: Vec<Address>) -> Self {
        let wallet = MockWallet::new(accounts);
        let rpc = MockContractRpc::new();
        let (sink, snapshots) = WatchSink::new();
        let session = Session::new(
            Some(wallet.clone() as Arc<dyn WalletProvider>),
            rpc.clone(),
            Arc::new(sink),
            &ContractConfig::default(),
        );
        Self {
            session,
            wallet,
            rpc,
            snapshots,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }
}

pub fn hello() -> Vec<DynSolValue> {
    vec![DynSolValue::String("Hello, Hardhat!".to_string())]
}

/// Run `fut` with a deadline so a hung await fails the test instead of the suite.
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(2), fut)
        .await
        .expect("operation timed out")
}
