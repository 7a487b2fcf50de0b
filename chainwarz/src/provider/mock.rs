//! Scripted in-memory provider for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{
    EventHandler, Eip1193Provider, ProviderError, ProviderEvent, ProviderEventKind,
    SubscriptionId, methods,
};

pub(crate) const ACCOUNT: &str = "0xABCD000000000000000000000000000000001234";
pub(crate) const TX_HASH: &str =
    "0x5f3c8e5a8d1b4c2e9f7a6b5c4d3e2f1a0b9c8d7e6f5a4b3c2d1e0f9a8b7c6d5e";

/// How `wallet_switchEthereumChain` behaves.
#[derive(Debug, Clone)]
pub(crate) enum SwitchBehavior {
    /// Succeed and make the requested chain current.
    Apply,
    /// Succeed without changing the current chain.
    Ignore,
    /// Always fail with 4902.
    Unrecognized,
    /// Fail with 4902 until the chain has been added, then apply.
    UnrecognizedUntilAdded,
    /// Fail with 4902 until the chain has been added, then with the given error.
    UnrecognizedThenFail(ProviderError),
    /// Fail with the given error.
    Fail(ProviderError),
}

/// How `wallet_addEthereumChain` behaves.
#[derive(Debug, Clone)]
pub(crate) enum AddBehavior {
    /// Succeed and make the added chain current.
    ApplyAndSwitch,
    /// Succeed without switching.
    Apply,
    /// Fail with the given error.
    Fail(ProviderError),
}

#[derive(Debug)]
struct MockState {
    accounts: Result<Vec<String>, ProviderError>,
    current_chain: String,
    chain_script: VecDeque<Result<String, ProviderError>>,
    switch: SwitchBehavior,
    add: AddBehavior,
    added: bool,
    send: Result<String, ProviderError>,
    calls: Vec<(String, Value)>,
    next_subscription: u64,
}

pub(crate) struct MockProvider {
    state: Mutex<MockState>,
    listeners: Mutex<Vec<(SubscriptionId, ProviderEventKind, EventHandler)>>,
    events: bool,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider").finish_non_exhaustive()
    }
}

impl MockProvider {
    /// A provider with one account on the given chain, where switching works.
    pub(crate) fn new(chain: &str) -> Self {
        Self {
            state: Mutex::new(MockState {
                accounts: Ok(vec![ACCOUNT.to_owned()]),
                current_chain: chain.to_owned(),
                chain_script: VecDeque::new(),
                switch: SwitchBehavior::Apply,
                add: AddBehavior::ApplyAndSwitch,
                added: false,
                send: Ok(TX_HASH.to_owned()),
                calls: Vec::new(),
                next_subscription: 0,
            }),
            listeners: Mutex::new(Vec::new()),
            events: true,
        }
    }

    pub(crate) fn without_events(mut self) -> Self {
        self.events = false;
        self
    }

    pub(crate) fn with_accounts(self, accounts: Result<Vec<String>, ProviderError>) -> Self {
        self.state.lock().unwrap().accounts = accounts;
        self
    }

    pub(crate) fn with_switch(self, switch: SwitchBehavior) -> Self {
        self.state.lock().unwrap().switch = switch;
        self
    }

    pub(crate) fn with_add(self, add: AddBehavior) -> Self {
        self.state.lock().unwrap().add = add;
        self
    }

    pub(crate) fn with_send(self, send: Result<String, ProviderError>) -> Self {
        self.state.lock().unwrap().send = send;
        self
    }

    /// Queue results for upcoming `eth_chainId` calls ahead of the current chain.
    pub(crate) fn script_chain_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock().unwrap();
        state.chain_script.extend(ids.into_iter().map(|id| Ok(id.into())));
    }

    pub(crate) fn script_chain_error(&self, err: ProviderError) {
        self.state.lock().unwrap().chain_script.push_back(Err(err));
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    pub(crate) fn calls_to(&self, method: &str) -> usize {
        self.calls().iter().filter(|m| *m == method).count()
    }

    pub(crate) fn last_params(&self, method: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Deliver an event to every matching listener.
    pub(crate) fn emit(&self, event: &ProviderEvent) {
        let handlers: Vec<EventHandler> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind())
            .map(|(_, _, h)| h.clone())
            .collect();
        for handler in handlers {
            handler(event);
        }
    }
}

#[async_trait]
impl Eip1193Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((method.to_owned(), params.clone()));
        let requested = params[0]["chainId"].as_str().map(str::to_owned);

        match method {
            methods::REQUEST_ACCOUNTS | methods::ACCOUNTS => {
                state.accounts.clone().map(|a| json!(a))
            }
            methods::CHAIN_ID => match state.chain_script.pop_front() {
                Some(scripted) => scripted.map(Value::String),
                None => Ok(Value::String(state.current_chain.clone())),
            },
            methods::SWITCH_CHAIN => {
                let requested = requested.unwrap_or_default();
                match state.switch.clone() {
                    SwitchBehavior::Apply => {
                        state.current_chain = requested;
                        Ok(Value::Null)
                    }
                    SwitchBehavior::Ignore => Ok(Value::Null),
                    SwitchBehavior::Unrecognized => {
                        Err(ProviderError::unrecognized_chain(requested))
                    }
                    SwitchBehavior::UnrecognizedUntilAdded if state.added => {
                        state.current_chain = requested;
                        Ok(Value::Null)
                    }
                    SwitchBehavior::UnrecognizedUntilAdded => {
                        Err(ProviderError::unrecognized_chain(requested))
                    }
                    SwitchBehavior::UnrecognizedThenFail(err) if state.added => Err(err),
                    SwitchBehavior::UnrecognizedThenFail(_) => {
                        Err(ProviderError::unrecognized_chain(requested))
                    }
                    SwitchBehavior::Fail(err) => Err(err),
                }
            }
            methods::ADD_CHAIN => match state.add.clone() {
                AddBehavior::ApplyAndSwitch => {
                    state.added = true;
                    state.current_chain = requested.unwrap_or_default();
                    Ok(Value::Null)
                }
                AddBehavior::Apply => {
                    state.added = true;
                    Ok(Value::Null)
                }
                AddBehavior::Fail(err) => Err(err),
            },
            methods::SEND_TRANSACTION => state.send.clone().map(Value::String),
            other => Err(ProviderError::new(
                super::codes::UNSUPPORTED_METHOD,
                format!("{other} not supported"),
            )),
        }
    }

    fn on(&self, kind: ProviderEventKind, handler: EventHandler) -> Option<SubscriptionId> {
        if !self.events {
            return None;
        }
        let id = {
            let mut state = self.state.lock().unwrap();
            state.next_subscription += 1;
            SubscriptionId(state.next_subscription)
        };
        self.listeners.lock().unwrap().push((id, kind, handler));
        Some(id)
    }

    fn remove_listener(&self, id: SubscriptionId) {
        self.listeners.lock().unwrap().retain(|(sid, _, _)| *sid != id);
    }
}
