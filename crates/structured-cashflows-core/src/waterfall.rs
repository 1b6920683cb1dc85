//! Payment waterfall engine.
//!
//! Distributes periodic collections across accounts and priority-ordered
//! payment tiers with trigger gating and reserve-account rules:
//! - Collections credit the Principal/Interest collection accounts
//! - Triggers re-evaluate each period and gate tiers
//! - Reserve rules replenish below-target accounts and release excess
//! - Sequential tiers pay in listed order; pro-rata tiers split by share
//!
//! Account and trigger state persist across periods within one engine
//! instance; independent simulations need fresh instances.
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{ScfError, ValidationError};
use crate::types::Money;
use crate::ScfResult;

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    Principal,
    Interest,
    Reserve,
    Fees,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerType {
    #[serde(rename = "OC")]
    Oc,
    #[serde(rename = "IC")]
    Ic,
    Delinquency,
    #[serde(rename = "Cumulative Loss")]
    CumulativeLoss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentType {
    Sequential,
    #[serde(rename = "Pro Rata")]
    ProRata,
    #[serde(rename = "Modified Pro Rata")]
    ModifiedProRata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerOperator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
}

/// A cash account in the structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub balance: Money,
    #[serde(default)]
    pub minimum_balance: Option<Money>,
    #[serde(default)]
    pub target_balance: Option<Money>,
}

/// A performance test gating payment tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    pub threshold: Decimal,
    pub operator: TriggerOperator,
    /// Last evaluated metric value.
    #[serde(default)]
    pub value: Decimal,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecipient {
    pub name: String,
    /// Pro-rata weight in (0, 1]. Defaults to 1.
    #[serde(default)]
    pub share: Option<Decimal>,
    #[serde(default)]
    pub cap: Option<Money>,
    #[serde(default)]
    pub floor: Option<Money>,
}

/// One priority level of the waterfall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTier {
    pub priority: u32,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub recipients: Vec<PaymentRecipient>,
    /// Trigger names that must all be active for the tier to run.
    #[serde(default)]
    pub trigger_conditions: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveAccountRule {
    pub account_name: String,
    pub replenishment_priority: u32,
    pub target_balance: Money,
    #[serde(default)]
    pub minimum_balance: Option<Money>,
    #[serde(default)]
    pub release_excess: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallConfig {
    pub accounts: Vec<Account>,
    pub triggers: Vec<Trigger>,
    pub payments: Vec<PaymentTier>,
    #[serde(default)]
    pub reserve_account_rules: Vec<ReserveAccountRule>,
}

impl WaterfallConfig {
    /// The conventional three-account structure: principal and interest
    /// collection accounts, a funded reserve with OC/IC tests, and a
    /// senior-fees / Class A interest / Class A principal sequential stack.
    pub fn standard() -> Self {
        WaterfallConfig {
            accounts: vec![
                Account {
                    name: "Principal Collection Account".into(),
                    account_type: AccountType::Principal,
                    balance: Decimal::ZERO,
                    minimum_balance: None,
                    target_balance: None,
                },
                Account {
                    name: "Interest Collection Account".into(),
                    account_type: AccountType::Interest,
                    balance: Decimal::ZERO,
                    minimum_balance: None,
                    target_balance: None,
                },
                Account {
                    name: "Reserve Account".into(),
                    account_type: AccountType::Reserve,
                    balance: Decimal::ZERO,
                    minimum_balance: Some(dec!(1_000_000)),
                    target_balance: Some(dec!(2_000_000)),
                },
            ],
            triggers: vec![
                Trigger {
                    name: "OC Test".into(),
                    trigger_type: TriggerType::Oc,
                    threshold: dec!(1.25),
                    operator: TriggerOperator::LessThan,
                    value: Decimal::ZERO,
                    is_active: false,
                    description: None,
                },
                Trigger {
                    name: "IC Test".into(),
                    trigger_type: TriggerType::Ic,
                    threshold: dec!(1.1),
                    operator: TriggerOperator::LessThan,
                    value: Decimal::ZERO,
                    is_active: false,
                    description: None,
                },
            ],
            payments: vec![
                PaymentTier {
                    priority: 1,
                    payment_type: PaymentType::Sequential,
                    recipients: vec![PaymentRecipient {
                        name: "Senior Fees".into(),
                        share: None,
                        cap: Some(dec!(100_000)),
                        floor: None,
                    }],
                    trigger_conditions: vec![],
                    description: Some("Senior Fees Payment".into()),
                },
                PaymentTier {
                    priority: 2,
                    payment_type: PaymentType::Sequential,
                    recipients: vec![PaymentRecipient {
                        name: "Class A Interest".into(),
                        share: None,
                        cap: None,
                        floor: None,
                    }],
                    trigger_conditions: vec![],
                    description: Some("Class A Interest Payment".into()),
                },
                PaymentTier {
                    priority: 3,
                    payment_type: PaymentType::Sequential,
                    recipients: vec![PaymentRecipient {
                        name: "Class A Principal".into(),
                        share: None,
                        cap: None,
                        floor: None,
                    }],
                    trigger_conditions: vec![],
                    description: Some("Class A Principal Payment".into()),
                },
            ],
            reserve_account_rules: vec![ReserveAccountRule {
                account_name: "Reserve Account".into(),
                replenishment_priority: 1,
                target_balance: dec!(2_000_000),
                minimum_balance: Some(dec!(1_000_000)),
                release_excess: true,
            }],
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// One ledgered payment out of the structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    pub recipient: String,
    pub amount: Money,
    /// The dominant account type the payment was drawn from.
    pub source: AccountType,
    pub priority: u32,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallResult {
    pub payments: Vec<PaymentResult>,
    pub ending_balances: BTreeMap<String, Money>,
    pub trigger_states: BTreeMap<String, bool>,
    /// Sum of every account balance left after the period.
    pub unallocated_funds: Money,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns the mutable account and trigger state for one simulation.
#[derive(Debug)]
pub struct WaterfallEngine {
    accounts: Vec<Account>,
    triggers: Vec<Trigger>,
    payments: Vec<PaymentTier>,
    reserve_rules: Vec<ReserveAccountRule>,
}

impl WaterfallEngine {
    /// Validate the configuration and take ownership of its state. Every
    /// structural violation is fatal here, before any simulation runs.
    pub fn new(config: WaterfallConfig) -> ScfResult<Self> {
        for tier in &config.payments {
            if tier.payment_type == PaymentType::ModifiedProRata {
                return Err(ScfError::Unsupported(
                    "modified pro-rata payment tiers are not implemented".into(),
                ));
            }
        }

        validate_config(&config)?;

        let WaterfallConfig {
            accounts,
            triggers,
            mut payments,
            mut reserve_account_rules,
        } = config;

        payments.sort_by_key(|tier| tier.priority);
        reserve_account_rules.sort_by_key(|rule| rule.replenishment_priority);

        Ok(WaterfallEngine {
            accounts,
            triggers,
            payments,
            reserve_rules: reserve_account_rules,
        })
    }

    /// Run one collection period through the waterfall. Collections are
    /// credited, triggers re-evaluated, reserve rules applied, and payment
    /// tiers processed in priority order.
    pub fn process_period(
        &mut self,
        principal: Money,
        interest: Money,
        prepayment: Money,
        recovery: Money,
    ) -> ScfResult<WaterfallResult> {
        for (field, amount) in [
            ("principal", principal),
            ("interest", interest),
            ("prepayment", prepayment),
            ("recovery", recovery),
        ] {
            if amount < Decimal::ZERO {
                return Err(ScfError::InvalidInput {
                    field: field.into(),
                    reason: "collections cannot be negative".into(),
                });
            }
        }

        let mut ledger: Vec<PaymentResult> = Vec::new();

        // 1. Collections: principal-like flows to the Principal account,
        //    interest to the Interest account.
        self.credit(AccountType::Principal, principal + prepayment + recovery);
        self.credit(AccountType::Interest, interest);

        // 2. Trigger re-evaluation.
        for trigger in &mut self.triggers {
            trigger.value = trigger_metric(trigger.trigger_type);
            trigger.is_active = evaluate(trigger.value, trigger.operator, trigger.threshold);
        }

        // 3. Reserve rules in replenishment-priority order. Replenishment and
        //    release are internal transfers: they move funds between accounts
        //    without entering the payment ledger.
        for rule_index in 0..self.reserve_rules.len() {
            let rule = self.reserve_rules[rule_index].clone();
            let account_index = match self.account_index(&rule.account_name) {
                Some(index) => index,
                None => continue,
            };

            let balance = self.accounts[account_index].balance;
            if balance < rule.target_balance {
                let shortfall = rule.target_balance - balance;
                let (drawn, _) = self.draw(shortfall);
                self.accounts[account_index].balance += drawn;
            }

            let balance = self.accounts[account_index].balance;
            if rule.release_excess && balance > rule.target_balance {
                let excess = balance - rule.target_balance;
                self.accounts[account_index].balance = rule.target_balance;
                self.credit(AccountType::Principal, excess);
            }
        }

        // 4. Payment tiers in priority order.
        for tier_index in 0..self.payments.len() {
            let tier = self.payments[tier_index].clone();
            if !self.should_run(&tier) {
                continue;
            }
            match tier.payment_type {
                PaymentType::Sequential => self.run_sequential(&tier, &mut ledger),
                PaymentType::ProRata => self.run_pro_rata(&tier, &mut ledger),
                // Rejected at construction.
                PaymentType::ModifiedProRata => {
                    return Err(ScfError::Unsupported(
                        "modified pro-rata payment tiers are not implemented".into(),
                    ))
                }
            }
        }

        let ending_balances: BTreeMap<String, Money> = self
            .accounts
            .iter()
            .map(|account| (account.name.clone(), account.balance))
            .collect();
        let trigger_states: BTreeMap<String, bool> = self
            .triggers
            .iter()
            .map(|trigger| (trigger.name.clone(), trigger.is_active))
            .collect();
        let unallocated_funds = self.accounts.iter().map(|account| account.balance).sum();

        Ok(WaterfallResult {
            payments: ledger,
            ending_balances,
            trigger_states,
            unallocated_funds,
        })
    }

    /// A tier runs only when every named trigger is active; an empty
    /// condition list always runs.
    fn should_run(&self, tier: &PaymentTier) -> bool {
        tier.trigger_conditions.iter().all(|name| {
            self.triggers
                .iter()
                .find(|trigger| trigger.name == *name)
                .map(|trigger| trigger.is_active)
                .unwrap_or(false)
        })
    }

    fn run_sequential(&mut self, tier: &PaymentTier, ledger: &mut Vec<PaymentResult>) {
        let mut pool = self.distributable_funds();

        for recipient in &tier.recipients {
            if pool <= Decimal::ZERO {
                break;
            }
            let mut requested = match recipient.cap {
                Some(cap) => pool.min(cap),
                None => pool,
            };
            requested = requested.max(recipient.floor.unwrap_or(Decimal::ZERO));

            let (paid, source) = self.draw(requested);
            if paid > Decimal::ZERO {
                ledger.push(PaymentResult {
                    recipient: recipient.name.clone(),
                    amount: paid,
                    source,
                    priority: tier.priority,
                    payment_type: tier.payment_type,
                });
                pool -= paid;
            }
        }
    }

    /// Pro-rata splits one snapshot of the pool by share; each allocation is
    /// still bounded by its cap/floor and by what the accounts actually hold.
    fn run_pro_rata(&mut self, tier: &PaymentTier, ledger: &mut Vec<PaymentResult>) {
        let pool = self.distributable_funds();
        let total_shares: Decimal = tier
            .recipients
            .iter()
            .map(|recipient| recipient.share.unwrap_or(Decimal::ONE))
            .sum();
        if total_shares <= Decimal::ZERO {
            return;
        }

        for recipient in &tier.recipients {
            let share = recipient.share.unwrap_or(Decimal::ONE);
            let mut requested = pool * share / total_shares;
            if let Some(cap) = recipient.cap {
                requested = requested.min(cap);
            }
            requested = requested.max(recipient.floor.unwrap_or(Decimal::ZERO));

            let (paid, source) = self.draw(requested);
            if paid > Decimal::ZERO {
                ledger.push(PaymentResult {
                    recipient: recipient.name.clone(),
                    amount: paid,
                    source,
                    priority: tier.priority,
                    payment_type: tier.payment_type,
                });
            }
        }
    }

    /// Debit up to `amount` from the Principal account, then the Interest
    /// account. Returns what was actually drawn and the dominant source.
    fn draw(&mut self, amount: Money) -> (Money, AccountType) {
        let mut remaining = amount;
        let mut principal_portion = Decimal::ZERO;
        let mut interest_portion = Decimal::ZERO;

        if let Some(index) = self.type_index(AccountType::Principal) {
            let take = remaining.min(self.accounts[index].balance).max(Decimal::ZERO);
            self.accounts[index].balance -= take;
            principal_portion = take;
            remaining -= take;
        }
        if remaining > Decimal::ZERO {
            if let Some(index) = self.type_index(AccountType::Interest) {
                let take = remaining.min(self.accounts[index].balance).max(Decimal::ZERO);
                self.accounts[index].balance -= take;
                interest_portion = take;
            }
        }

        let source = if interest_portion > principal_portion {
            AccountType::Interest
        } else {
            AccountType::Principal
        };
        (principal_portion + interest_portion, source)
    }

    fn credit(&mut self, account_type: AccountType, amount: Money) {
        if amount.is_zero() {
            return;
        }
        // A matching account is guaranteed by construction for Principal and
        // Interest.
        if let Some(index) = self.type_index(account_type) {
            self.accounts[index].balance += amount;
        }
    }

    /// Funds available for distribution: the Principal and Interest
    /// collection account balances.
    fn distributable_funds(&self) -> Money {
        let principal = self
            .type_index(AccountType::Principal)
            .map(|index| self.accounts[index].balance)
            .unwrap_or(Decimal::ZERO);
        let interest = self
            .type_index(AccountType::Interest)
            .map(|index| self.accounts[index].balance)
            .unwrap_or(Decimal::ZERO);
        principal + interest
    }

    fn account_index(&self, name: &str) -> Option<usize> {
        self.accounts.iter().position(|account| account.name == name)
    }

    /// First account of a type, in configuration order.
    fn type_index(&self, account_type: AccountType) -> Option<usize> {
        self.accounts
            .iter()
            .position(|account| account.account_type == account_type)
    }
}

fn evaluate(value: Decimal, operator: TriggerOperator, threshold: Decimal) -> bool {
    match operator {
        TriggerOperator::GreaterThan => value > threshold,
        TriggerOperator::LessThan => value < threshold,
        TriggerOperator::GreaterOrEqual => value >= threshold,
        TriggerOperator::LessOrEqual => value <= threshold,
    }
}

/// Portfolio coverage metrics are extension points: until collateral state is
/// wired into the engine, every ratio evaluates to zero and triggers fire
/// purely off their operator and threshold.
fn trigger_metric(trigger_type: TriggerType) -> Decimal {
    match trigger_type {
        TriggerType::Oc => oc_ratio(),
        TriggerType::Ic => ic_ratio(),
        TriggerType::Delinquency => delinquency_ratio(),
        TriggerType::CumulativeLoss => cumulative_loss_ratio(),
    }
}

fn oc_ratio() -> Decimal {
    Decimal::ZERO
}

fn ic_ratio() -> Decimal {
    Decimal::ZERO
}

fn delinquency_ratio() -> Decimal {
    Decimal::ZERO
}

fn cumulative_loss_ratio() -> Decimal {
    Decimal::ZERO
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_config(config: &WaterfallConfig) -> ScfResult<()> {
    let mut errors: Vec<ValidationError> = Vec::new();

    if config.accounts.is_empty() {
        errors.push(ValidationError::new(
            "accounts",
            "at least one account is required",
        ));
    }

    let mut account_names: Vec<&str> = Vec::new();
    for account in &config.accounts {
        if account_names.contains(&account.name.as_str()) {
            errors.push(ValidationError::new(
                format!("accounts[{}]", account.name),
                "account names must be unique",
            ));
        } else {
            account_names.push(&account.name);
        }
    }

    // Without these two, collections would have nowhere to land.
    for required in [AccountType::Principal, AccountType::Interest] {
        if !config
            .accounts
            .iter()
            .any(|account| account.account_type == required)
        {
            errors.push(ValidationError::new(
                "accounts",
                format!("an account of type {required:?} is required"),
            ));
        }
    }

    let mut trigger_names: Vec<&str> = Vec::new();
    for trigger in &config.triggers {
        if trigger_names.contains(&trigger.name.as_str()) {
            errors.push(ValidationError::new(
                format!("triggers[{}]", trigger.name),
                "trigger names must be unique",
            ));
        } else {
            trigger_names.push(&trigger.name);
        }
    }

    let mut priorities: Vec<u32> = Vec::new();
    for tier in &config.payments {
        if priorities.contains(&tier.priority) {
            errors.push(ValidationError::new(
                format!("payments[{}]", tier.priority),
                "payment priorities must be unique",
            ));
        } else {
            priorities.push(tier.priority);
        }

        if tier.recipients.is_empty() {
            errors.push(ValidationError::new(
                format!("payments[{}].recipients", tier.priority),
                "at least one recipient is required",
            ));
        }

        for name in &tier.trigger_conditions {
            if !trigger_names.contains(&name.as_str()) {
                errors.push(ValidationError::new(
                    format!("payments[{}].trigger_conditions", tier.priority),
                    format!("references unknown trigger '{name}'"),
                ));
            }
        }

        for recipient in &tier.recipients {
            let field = format!("payments[{}].{}", tier.priority, recipient.name);
            if let Some(share) = recipient.share {
                if share <= Decimal::ZERO || share > Decimal::ONE {
                    errors.push(ValidationError::new(
                        field.clone(),
                        "share must be in (0, 1]",
                    ));
                }
            }
            if let Some(cap) = recipient.cap {
                if cap < Decimal::ZERO {
                    errors.push(ValidationError::new(
                        field.clone(),
                        "cap cannot be negative",
                    ));
                }
            }
            if let Some(floor) = recipient.floor {
                if floor < Decimal::ZERO {
                    errors.push(ValidationError::new(
                        field.clone(),
                        "floor cannot be negative",
                    ));
                }
            }
            if let (Some(floor), Some(cap)) = (recipient.floor, recipient.cap) {
                if floor > cap {
                    errors.push(ValidationError::new(field, "floor cannot exceed cap"));
                }
            }
        }
    }

    for rule in &config.reserve_account_rules {
        if !account_names.contains(&rule.account_name.as_str()) {
            errors.push(ValidationError::new(
                format!("reserve_account_rules[{}]", rule.account_name),
                "references a non-existent account",
            ));
        }
        if rule.target_balance < Decimal::ZERO {
            errors.push(ValidationError::new(
                format!("reserve_account_rules[{}]", rule.account_name),
                "target balance cannot be negative",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ScfError::InvalidConfiguration(errors))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn account(name: &str, account_type: AccountType, balance: Decimal) -> Account {
        Account {
            name: name.into(),
            account_type,
            balance,
            minimum_balance: None,
            target_balance: None,
        }
    }

    fn recipient(name: &str) -> PaymentRecipient {
        PaymentRecipient {
            name: name.into(),
            share: None,
            cap: None,
            floor: None,
        }
    }

    fn sequential(priority: u32, recipients: Vec<PaymentRecipient>) -> PaymentTier {
        PaymentTier {
            priority,
            payment_type: PaymentType::Sequential,
            recipients,
            trigger_conditions: vec![],
            description: None,
        }
    }

    fn base_config() -> WaterfallConfig {
        WaterfallConfig {
            accounts: vec![
                account("Principal", AccountType::Principal, Decimal::ZERO),
                account("Interest", AccountType::Interest, Decimal::ZERO),
            ],
            triggers: vec![],
            payments: vec![],
            reserve_account_rules: vec![],
        }
    }

    fn total_paid(result: &WaterfallResult) -> Decimal {
        result.payments.iter().map(|p| p.amount).sum()
    }

    #[test]
    fn test_standard_config_constructs() {
        assert!(WaterfallEngine::new(WaterfallConfig::standard()).is_ok());
    }

    #[test]
    fn test_collections_distribute_by_account_type() {
        let mut engine = WaterfallEngine::new(base_config()).unwrap();
        let result = engine
            .process_period(dec!(1000), dec!(200), dec!(300), dec!(50))
            .unwrap();

        // Principal + prepayment + recovery to the Principal account.
        assert_eq!(result.ending_balances["Principal"], dec!(1350));
        assert_eq!(result.ending_balances["Interest"], dec!(200));
        assert_eq!(result.unallocated_funds, dec!(1550));
        assert!(result.payments.is_empty());
    }

    #[test]
    fn test_sequential_tier_pays_in_order_with_cap() {
        let mut config = base_config();
        config.payments = vec![
            sequential(
                1,
                vec![PaymentRecipient {
                    name: "Senior Fees".into(),
                    share: None,
                    cap: Some(dec!(100)),
                    floor: None,
                }],
            ),
            sequential(2, vec![recipient("Class A Interest")]),
        ];
        let mut engine = WaterfallEngine::new(config).unwrap();
        let result = engine
            .process_period(dec!(0), dec!(500), dec!(0), dec!(0))
            .unwrap();

        assert_eq!(result.payments.len(), 2);
        assert_eq!(result.payments[0].recipient, "Senior Fees");
        assert_eq!(result.payments[0].amount, dec!(100));
        assert_eq!(result.payments[1].recipient, "Class A Interest");
        assert_eq!(result.payments[1].amount, dec!(400));
        assert_eq!(result.unallocated_funds, Decimal::ZERO);
    }

    #[test]
    fn test_payments_never_exceed_available_funds() {
        let mut config = base_config();
        config.payments = vec![sequential(
            1,
            vec![PaymentRecipient {
                name: "Floored".into(),
                share: None,
                cap: None,
                floor: Some(dec!(1_000_000)),
            }],
        )];
        let mut engine = WaterfallEngine::new(config).unwrap();
        let result = engine
            .process_period(dec!(100), dec!(50), dec!(0), dec!(0))
            .unwrap();

        // The floor cannot conjure funds the accounts do not hold.
        assert_eq!(total_paid(&result), dec!(150));
        assert_eq!(result.unallocated_funds, Decimal::ZERO);
    }

    #[test]
    fn test_floor_respected_when_funds_sufficient() {
        let mut config = base_config();
        config.payments = vec![sequential(
            1,
            vec![
                PaymentRecipient {
                    name: "Small Cap".into(),
                    share: None,
                    cap: Some(dec!(10)),
                    floor: Some(dec!(10)),
                },
                recipient("Residual"),
            ],
        )];
        let mut engine = WaterfallEngine::new(config).unwrap();
        let result = engine
            .process_period(dec!(1000), dec!(0), dec!(0), dec!(0))
            .unwrap();

        assert_eq!(result.payments[0].amount, dec!(10));
        assert_eq!(result.payments[1].amount, dec!(990));
    }

    #[test]
    fn test_pro_rata_splits_by_share() {
        let mut config = base_config();
        config.payments = vec![PaymentTier {
            priority: 1,
            payment_type: PaymentType::ProRata,
            recipients: vec![
                PaymentRecipient {
                    name: "Class A".into(),
                    share: Some(dec!(0.75)),
                    cap: None,
                    floor: None,
                },
                PaymentRecipient {
                    name: "Class B".into(),
                    share: Some(dec!(0.25)),
                    cap: None,
                    floor: None,
                },
            ],
            trigger_conditions: vec![],
            description: None,
        }];
        let mut engine = WaterfallEngine::new(config).unwrap();
        let result = engine
            .process_period(dec!(800), dec!(200), dec!(0), dec!(0))
            .unwrap();

        assert_eq!(result.payments[0].amount, dec!(750));
        assert_eq!(result.payments[1].amount, dec!(250));
    }

    #[test]
    fn test_pro_rata_default_share_is_one() {
        let mut config = base_config();
        config.payments = vec![PaymentTier {
            priority: 1,
            payment_type: PaymentType::ProRata,
            recipients: vec![recipient("A"), recipient("B")],
            trigger_conditions: vec![],
            description: None,
        }];
        let mut engine = WaterfallEngine::new(config).unwrap();
        let result = engine
            .process_period(dec!(100), dec!(0), dec!(0), dec!(0))
            .unwrap();

        assert_eq!(result.payments[0].amount, dec!(50));
        assert_eq!(result.payments[1].amount, dec!(50));
    }

    #[test]
    fn test_pro_rata_respects_caps() {
        let mut config = base_config();
        config.payments = vec![PaymentTier {
            priority: 1,
            payment_type: PaymentType::ProRata,
            recipients: vec![
                PaymentRecipient {
                    name: "Capped".into(),
                    share: Some(dec!(0.5)),
                    cap: Some(dec!(10)),
                    floor: None,
                },
                PaymentRecipient {
                    name: "Open".into(),
                    share: Some(dec!(0.5)),
                    cap: None,
                    floor: None,
                },
            ],
            trigger_conditions: vec![],
            description: None,
        }];
        let mut engine = WaterfallEngine::new(config).unwrap();
        let result = engine
            .process_period(dec!(100), dec!(0), dec!(0), dec!(0))
            .unwrap();

        assert_eq!(result.payments[0].amount, dec!(10));
        assert_eq!(result.payments[1].amount, dec!(50));
    }

    #[test]
    fn test_trigger_gates_tier() {
        let mut config = base_config();
        config.triggers = vec![
            Trigger {
                name: "Always On".into(),
                trigger_type: TriggerType::Oc,
                threshold: Decimal::ZERO,
                operator: TriggerOperator::GreaterOrEqual,
                value: Decimal::ZERO,
                is_active: false,
                description: None,
            },
            Trigger {
                name: "Never On".into(),
                trigger_type: TriggerType::Ic,
                threshold: Decimal::ZERO,
                operator: TriggerOperator::GreaterThan,
                value: Decimal::ZERO,
                is_active: false,
                description: None,
            },
        ];
        config.payments = vec![
            PaymentTier {
                trigger_conditions: vec!["Always On".into()],
                ..sequential(1, vec![recipient("Gated Open")])
            },
            PaymentTier {
                trigger_conditions: vec!["Never On".into()],
                ..sequential(2, vec![recipient("Gated Shut")])
            },
        ];
        let mut engine = WaterfallEngine::new(config).unwrap();
        let result = engine
            .process_period(dec!(100), dec!(0), dec!(0), dec!(0))
            .unwrap();

        // The metric stubs evaluate to zero, so >= 0 is active and > 0 is not.
        assert_eq!(result.trigger_states["Always On"], true);
        assert_eq!(result.trigger_states["Never On"], false);
        assert_eq!(result.payments.len(), 1);
        assert_eq!(result.payments[0].recipient, "Gated Open");
    }

    #[test]
    fn test_reserve_replenishes_without_entering_ledger() {
        let mut config = base_config();
        config
            .accounts
            .push(account("Reserve", AccountType::Reserve, Decimal::ZERO));
        config.reserve_account_rules = vec![ReserveAccountRule {
            account_name: "Reserve".into(),
            replenishment_priority: 1,
            target_balance: dec!(300),
            minimum_balance: None,
            release_excess: false,
        }];
        config.payments = vec![sequential(1, vec![recipient("Residual")])];
        let mut engine = WaterfallEngine::new(config).unwrap();
        let result = engine
            .process_period(dec!(1000), dec!(0), dec!(0), dec!(0))
            .unwrap();

        assert_eq!(result.ending_balances["Reserve"], dec!(300));
        // Only the residual distribution is ledgered.
        assert_eq!(result.payments.len(), 1);
        assert_eq!(result.payments[0].amount, dec!(700));
        assert_eq!(result.unallocated_funds, dec!(300));
    }

    #[test]
    fn test_reserve_releases_excess_to_principal() {
        let mut config = base_config();
        config
            .accounts
            .push(account("Reserve", AccountType::Reserve, dec!(500)));
        config.reserve_account_rules = vec![ReserveAccountRule {
            account_name: "Reserve".into(),
            replenishment_priority: 1,
            target_balance: dec!(300),
            minimum_balance: None,
            release_excess: true,
        }];
        let mut engine = WaterfallEngine::new(config).unwrap();
        let result = engine
            .process_period(dec!(0), dec!(0), dec!(0), dec!(0))
            .unwrap();

        assert_eq!(result.ending_balances["Reserve"], dec!(300));
        assert_eq!(result.ending_balances["Principal"], dec!(200));
    }

    #[test]
    fn test_reserve_state_persists_across_periods() {
        let mut config = base_config();
        config
            .accounts
            .push(account("Reserve", AccountType::Reserve, Decimal::ZERO));
        config.reserve_account_rules = vec![ReserveAccountRule {
            account_name: "Reserve".into(),
            replenishment_priority: 1,
            target_balance: dec!(300),
            minimum_balance: None,
            release_excess: false,
        }];
        config.payments = vec![sequential(1, vec![recipient("Residual")])];
        let mut engine = WaterfallEngine::new(config).unwrap();

        engine
            .process_period(dec!(1000), dec!(0), dec!(0), dec!(0))
            .unwrap();
        // Second period: the reserve is already at target, so the whole
        // collection flows through.
        let second = engine
            .process_period(dec!(400), dec!(0), dec!(0), dec!(0))
            .unwrap();
        assert_eq!(second.ending_balances["Reserve"], dec!(300));
        assert_eq!(second.payments[0].amount, dec!(400));
    }

    #[test]
    fn test_conservation_of_funds() {
        let mut config = base_config();
        config
            .accounts
            .push(account("Reserve", AccountType::Reserve, dec!(100)));
        config.reserve_account_rules = vec![ReserveAccountRule {
            account_name: "Reserve".into(),
            replenishment_priority: 1,
            target_balance: dec!(250),
            minimum_balance: None,
            release_excess: true,
        }];
        config.payments = vec![
            sequential(
                1,
                vec![PaymentRecipient {
                    name: "Fees".into(),
                    share: None,
                    cap: Some(dec!(40)),
                    floor: None,
                }],
            ),
            sequential(2, vec![recipient("Class A")]),
        ];
        let mut engine = WaterfallEngine::new(config).unwrap();

        let prior = dec!(100);
        let collections = dec!(500) + dec!(120);
        let result = engine
            .process_period(dec!(500), dec!(120), dec!(0), dec!(0))
            .unwrap();

        // No funds created or destroyed.
        assert_eq!(
            result.unallocated_funds + total_paid(&result),
            prior + collections
        );
    }

    #[test]
    fn test_payment_source_is_dominant_account() {
        let mut config = base_config();
        config.payments = vec![sequential(1, vec![recipient("Mixed")])];
        let mut engine = WaterfallEngine::new(config).unwrap();
        // 100 principal, 900 interest: a full draw is interest-dominant.
        let result = engine
            .process_period(dec!(100), dec!(900), dec!(0), dec!(0))
            .unwrap();

        assert_eq!(result.payments[0].amount, dec!(1000));
        assert_eq!(result.payments[0].source, AccountType::Interest);

        // Fresh period, principal-dominant.
        let result = engine
            .process_period(dec!(900), dec!(100), dec!(0), dec!(0))
            .unwrap();
        assert_eq!(result.payments[0].source, AccountType::Principal);
    }

    #[test]
    fn test_reject_duplicate_account_names() {
        let mut config = base_config();
        config
            .accounts
            .push(account("Principal", AccountType::Reserve, Decimal::ZERO));
        assert!(matches!(
            WaterfallEngine::new(config),
            Err(ScfError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_reject_missing_principal_or_interest_account() {
        let mut config = base_config();
        config.accounts.remove(0);
        assert!(WaterfallEngine::new(config).is_err());

        let mut config = base_config();
        config.accounts.remove(1);
        assert!(WaterfallEngine::new(config).is_err());
    }

    #[test]
    fn test_reject_duplicate_trigger_names() {
        let mut config = base_config();
        let trigger = Trigger {
            name: "OC".into(),
            trigger_type: TriggerType::Oc,
            threshold: dec!(1.2),
            operator: TriggerOperator::LessThan,
            value: Decimal::ZERO,
            is_active: false,
            description: None,
        };
        config.triggers = vec![trigger.clone(), trigger];
        assert!(WaterfallEngine::new(config).is_err());
    }

    #[test]
    fn test_reject_duplicate_priorities() {
        let mut config = base_config();
        config.payments = vec![
            sequential(1, vec![recipient("A")]),
            sequential(1, vec![recipient("B")]),
        ];
        assert!(WaterfallEngine::new(config).is_err());
    }

    #[test]
    fn test_reject_out_of_range_share() {
        for share in [dec!(0), dec!(1.5), dec!(-0.2)] {
            let mut config = base_config();
            config.payments = vec![PaymentTier {
                priority: 1,
                payment_type: PaymentType::ProRata,
                recipients: vec![PaymentRecipient {
                    name: "Bad".into(),
                    share: Some(share),
                    cap: None,
                    floor: None,
                }],
                trigger_conditions: vec![],
                description: None,
            }];
            assert!(WaterfallEngine::new(config).is_err(), "share {share}");
        }
    }

    #[test]
    fn test_reject_floor_above_cap() {
        let mut config = base_config();
        config.payments = vec![sequential(
            1,
            vec![PaymentRecipient {
                name: "Bad".into(),
                share: None,
                cap: Some(dec!(10)),
                floor: Some(dec!(20)),
            }],
        )];
        assert!(WaterfallEngine::new(config).is_err());
    }

    #[test]
    fn test_reject_dangling_reserve_rule() {
        let mut config = base_config();
        config.reserve_account_rules = vec![ReserveAccountRule {
            account_name: "Ghost".into(),
            replenishment_priority: 1,
            target_balance: dec!(100),
            minimum_balance: None,
            release_excess: false,
        }];
        assert!(WaterfallEngine::new(config).is_err());
    }

    #[test]
    fn test_reject_dangling_trigger_condition() {
        let mut config = base_config();
        config.payments = vec![PaymentTier {
            trigger_conditions: vec!["Ghost Trigger".into()],
            ..sequential(1, vec![recipient("A")])
        }];
        assert!(WaterfallEngine::new(config).is_err());
    }

    #[test]
    fn test_reject_modified_pro_rata_as_unsupported() {
        let mut config = base_config();
        config.payments = vec![PaymentTier {
            priority: 1,
            payment_type: PaymentType::ModifiedProRata,
            recipients: vec![recipient("A")],
            trigger_conditions: vec![],
            description: None,
        }];
        assert!(matches!(
            WaterfallEngine::new(config),
            Err(ScfError::Unsupported(_))
        ));
    }

    #[test]
    fn test_validation_collects_multiple_errors() {
        let mut config = base_config();
        config
            .accounts
            .push(account("Principal", AccountType::Fees, Decimal::ZERO));
        config.payments = vec![
            sequential(1, vec![]),
            sequential(1, vec![recipient("B")]),
        ];
        let err = WaterfallEngine::new(config).unwrap_err();
        match err {
            ScfError::InvalidConfiguration(errors) => assert!(errors.len() >= 3),
            other => panic!("expected InvalidConfiguration, got {other:?}"),
        }
    }

    #[test]
    fn test_reject_negative_collections() {
        let mut engine = WaterfallEngine::new(base_config()).unwrap();
        assert!(engine
            .process_period(dec!(-1), dec!(0), dec!(0), dec!(0))
            .is_err());
    }

    #[test]
    fn test_empty_condition_list_always_runs() {
        let mut config = base_config();
        config.payments = vec![sequential(1, vec![recipient("Unconditional")])];
        let mut engine = WaterfallEngine::new(config).unwrap();
        let result = engine
            .process_period(dec!(10), dec!(0), dec!(0), dec!(0))
            .unwrap();
        assert_eq!(result.payments.len(), 1);
    }
}
