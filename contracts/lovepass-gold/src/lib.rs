//! Lovepass Gold Entitlement Ledger
//!
//! A value-for-time subscription register keyed by account. Users buy
//! 30-day periods by paying the configured price in the payment token; the
//! admin capability can grant free time, revoke or restore accounts, reprice,
//! pause purchases and sweep collected funds to the treasury. Downstream
//! gateways call `is_active` before serving a gated resource.
//!
//! ## Storage Strategy
//! - `instance()`: Admin, Operator, Treasury, PaymentToken, Price, Grace,
//!   Paused and the withdraw lock. Small, fixed config with a single TTL.
//! - `persistent()`: one `UserRecord` per account, bumped on every write.
//!
//! ## State Machine
//! Per account:
//!
//!   (none) --subscribe/renew/grant--> Active(expiry)
//!   Active --time passes--> Grace (expiry <= now < expiry + grace)
//!   Grace  --time passes--> Expired
//!   any    --subscribe/renew/grant--> Active(max(now, expiry) + duration)
//!
//! `revoked` is an orthogonal flag that forces `is_active` to false without
//! touching `expiry` or `tier`.
//!
//! ## Invariants
//! - Time is always extended from `max(now, expiry)`, so unused time is never
//!   lost and overlapping purchases stack.
//! - Grace is applied at read time only; stored `expiry` never includes it.
//! - Price changes only affect future purchases.
//! - Pause blocks `subscribe`/`renew` only. Admin operations and reads stay
//!   available.
//! - Overpayment is accepted and retained; there is no refund of the excess.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, token::TokenClient,
    Address, Env, String,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of one purchasable period: 30 days in seconds.
pub const SECONDS_PER_PERIOD: u64 = 30 * 24 * 3600;

/// Persistent storage TTL in ledgers (~30 days at 5 s/ledger).
pub const PERSISTENT_BUMP_LEDGERS: u32 = 518_400;
/// Renew ~7 days before the entry would lapse.
pub const PERSISTENT_BUMP_THRESHOLD: u32 = PERSISTENT_BUMP_LEDGERS - 100_800;

// ---------------------------------------------------------------------------
// Error Types
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    Unauthorized = 3,
    Paused = 4,
    InsufficientPayment = 5,
    InvalidArgument = 6,
    Overflow = 7,
    Reentrant = 8,
}

// ---------------------------------------------------------------------------
// Storage Types
// ---------------------------------------------------------------------------

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    // --- instance() ---
    Admin,
    Operator,
    Treasury,
    PaymentToken,
    /// Price in smallest token units per 30-day period.
    Price,
    /// Read-time leniency in seconds.
    Grace,
    Paused,
    /// Set for the duration of the treasury transfer in `withdraw`.
    Locked,
    // --- persistent() ---
    User(Address),
}

/// Per-account entitlement record.
///
/// Accounts that never subscribed read as the zero record.
#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UserRecord {
    /// Unix timestamp (seconds) the account is paid through. Grace excluded.
    pub expiry: u64,
    /// Opaque subscription class, written by `grant`.
    pub tier: u32,
    pub revoked: bool,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct Initialized {
    pub admin: Address,
    pub operator: Address,
    pub treasury: Address,
    pub price_per_30d: i128,
    pub grace_seconds: u64,
}

#[contractevent]
pub struct Subscribed {
    #[topic]
    pub account: Address,
    pub periods: u32,
    pub expiry: u64,
    pub amount_paid: i128,
}

#[contractevent]
pub struct Granted {
    #[topic]
    pub account: Address,
    pub duration_seconds: u64,
    pub tier: u32,
    pub expiry: u64,
}

#[contractevent]
pub struct Revoked {
    #[topic]
    pub account: Address,
    pub reason: String,
}

#[contractevent]
pub struct Unrevoked {
    #[topic]
    pub account: Address,
}

#[contractevent]
pub struct PriceUpdated {
    pub old_price: i128,
    pub new_price: i128,
}

#[contractevent]
pub struct GraceUpdated {
    pub old_grace: u64,
    pub new_grace: u64,
}

#[contractevent]
pub struct ContractPaused {
    pub by: Address,
}

#[contractevent]
pub struct ContractUnpaused {
    pub by: Address,
}

#[contractevent]
pub struct Withdrawn {
    #[topic]
    pub treasury: Address,
    pub amount: i128,
}

#[contractevent]
pub struct OperatorUpdated {
    pub old_operator: Address,
    pub new_operator: Address,
}

#[contractevent]
pub struct AdminTransferred {
    pub old_admin: Address,
    pub new_admin: Address,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct LovepassGold;

#[contractimpl]
impl LovepassGold {
    // -----------------------------------------------------------------------
    // init
    // -----------------------------------------------------------------------

    /// Initialize the ledger. May only be called once.
    ///
    /// `admin` is the owner: it holds the admin capability and is the only
    /// address that may reassign roles. `operator` holds the admin capability
    /// as well. `treasury` receives everything `withdraw` sweeps.
    /// `payment_token` is the SEP-41 asset purchases are paid in.
    pub fn init(
        env: Env,
        admin: Address,
        payment_token: Address,
        price_per_30d: i128,
        treasury: Address,
        operator: Address,
        grace_seconds: u64,
    ) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }
        if price_per_30d < 0 {
            return Err(Error::InvalidArgument);
        }

        admin.require_auth();

        let instance = env.storage().instance();
        instance.set(&DataKey::Admin, &admin);
        instance.set(&DataKey::Operator, &operator);
        instance.set(&DataKey::Treasury, &treasury);
        instance.set(&DataKey::PaymentToken, &payment_token);
        instance.set(&DataKey::Price, &price_per_30d);
        instance.set(&DataKey::Grace, &grace_seconds);
        instance.set(&DataKey::Paused, &false);
        bump_instance(&env);

        Initialized {
            admin,
            operator,
            treasury,
            price_per_30d,
            grace_seconds,
        }
        .publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // subscribe / renew
    // -----------------------------------------------------------------------

    /// Buy `periods` 30-day periods for `payer`, paying `payment` tokens.
    ///
    /// `payment` must cover `periods * price`; any excess is kept. Time is
    /// added to `max(now, expiry)`. The tier is left as is. Returns the new
    /// expiry.
    pub fn subscribe(env: Env, payer: Address, periods: u32, payment: i128) -> Result<u64, Error> {
        purchase(&env, payer, periods, payment)
    }

    /// Extend `payer`'s entitlement. Identical to `subscribe`.
    pub fn renew(env: Env, payer: Address, periods: u32, payment: i128) -> Result<u64, Error> {
        purchase(&env, payer, periods, payment)
    }

    // -----------------------------------------------------------------------
    // admin: entitlement
    // -----------------------------------------------------------------------

    /// Grant `duration_seconds` of free time to `account` and set its tier.
    /// Admin capability only. Not blocked by pause.
    pub fn grant(
        env: Env,
        caller: Address,
        account: Address,
        duration_seconds: u64,
        tier: u32,
    ) -> Result<u64, Error> {
        require_admin_capability(&env, &caller)?;

        let key = DataKey::User(account.clone());
        let mut record = get_user(&env, &key);
        record.expiry = extend_from(env.ledger().timestamp(), record.expiry, duration_seconds)?;
        record.tier = tier;
        set_user(&env, &key, &record);

        Granted {
            account,
            duration_seconds,
            tier,
            expiry: record.expiry,
        }
        .publish(&env);

        Ok(record.expiry)
    }

    /// Mark `account` revoked. `expiry` and `tier` are preserved.
    pub fn revoke(env: Env, caller: Address, account: Address, reason: String) -> Result<(), Error> {
        require_admin_capability(&env, &caller)?;

        let key = DataKey::User(account.clone());
        let mut record = get_user(&env, &key);
        record.revoked = true;
        set_user(&env, &key, &record);

        Revoked { account, reason }.publish(&env);

        Ok(())
    }

    /// Clear the revoked flag on `account`.
    pub fn unrevoke(env: Env, caller: Address, account: Address) -> Result<(), Error> {
        require_admin_capability(&env, &caller)?;

        let key = DataKey::User(account.clone());
        let mut record = get_user(&env, &key);
        record.revoked = false;
        set_user(&env, &key, &record);

        Unrevoked { account }.publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // admin: configuration
    // -----------------------------------------------------------------------

    pub fn set_price_per_30d(env: Env, caller: Address, new_price: i128) -> Result<(), Error> {
        require_admin_capability(&env, &caller)?;
        if new_price < 0 {
            return Err(Error::InvalidArgument);
        }

        let old_price = get_price(&env)?;
        env.storage().instance().set(&DataKey::Price, &new_price);

        PriceUpdated {
            old_price,
            new_price,
        }
        .publish(&env);

        Ok(())
    }

    pub fn set_grace_seconds(env: Env, caller: Address, new_grace: u64) -> Result<(), Error> {
        require_admin_capability(&env, &caller)?;

        let old_grace = get_grace(&env);
        env.storage().instance().set(&DataKey::Grace, &new_grace);

        GraceUpdated {
            old_grace,
            new_grace,
        }
        .publish(&env);

        Ok(())
    }

    pub fn pause(env: Env, caller: Address) -> Result<(), Error> {
        require_admin_capability(&env, &caller)?;
        env.storage().instance().set(&DataKey::Paused, &true);
        ContractPaused { by: caller }.publish(&env);
        Ok(())
    }

    pub fn unpause(env: Env, caller: Address) -> Result<(), Error> {
        require_admin_capability(&env, &caller)?;
        env.storage().instance().set(&DataKey::Paused, &false);
        ContractUnpaused { by: caller }.publish(&env);
        Ok(())
    }

    /// Reassign the operator role. Owner only.
    pub fn set_operator(env: Env, caller: Address, new_operator: Address) -> Result<(), Error> {
        require_owner(&env, &caller)?;

        let old_operator: Address = env
            .storage()
            .instance()
            .get(&DataKey::Operator)
            .ok_or(Error::NotInitialized)?;
        env.storage()
            .instance()
            .set(&DataKey::Operator, &new_operator);

        OperatorUpdated {
            old_operator,
            new_operator,
        }
        .publish(&env);

        Ok(())
    }

    /// Hand the owner role to `new_admin`. Owner only.
    pub fn transfer_admin(env: Env, caller: Address, new_admin: Address) -> Result<(), Error> {
        require_owner(&env, &caller)?;

        env.storage().instance().set(&DataKey::Admin, &new_admin);

        AdminTransferred {
            old_admin: caller,
            new_admin,
        }
        .publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // withdraw
    // -----------------------------------------------------------------------

    /// Sweep the contract's whole payment-token balance to the treasury.
    ///
    /// The lock is taken before the external transfer and released after it,
    /// so a nested call into `withdraw` fails with `Reentrant`. Returns the
    /// amount moved; an empty balance moves nothing and returns 0.
    pub fn withdraw(env: Env, caller: Address) -> Result<i128, Error> {
        require_admin_capability(&env, &caller)?;

        if env
            .storage()
            .instance()
            .get(&DataKey::Locked)
            .unwrap_or(false)
        {
            return Err(Error::Reentrant);
        }

        let treasury = get_treasury(&env)?;
        let token = TokenClient::new(&env, &get_payment_token(&env)?);
        let this = env.current_contract_address();
        let amount = token.balance(&this);
        if amount <= 0 {
            return Ok(0);
        }

        env.storage().instance().set(&DataKey::Locked, &true);
        token.transfer(&this, &treasury, &amount);
        env.storage().instance().set(&DataKey::Locked, &false);

        Withdrawn { treasury, amount }.publish(&env);

        Ok(amount)
    }

    // -----------------------------------------------------------------------
    // reads
    // -----------------------------------------------------------------------

    /// Return `(active, expiry)` for `account`.
    ///
    /// `active` is `!revoked && now < expiry + grace`. An account that never
    /// held an entitlement is `(false, 0)`. Never fails.
    pub fn is_active(env: Env, account: Address) -> (bool, u64) {
        let record = get_user(&env, &DataKey::User(account));
        let active = entitled_at(&record, env.ledger().timestamp(), get_grace(&env));
        (active, record.expiry)
    }

    /// Raw record for `account`; the zero record if none was ever written.
    pub fn user(env: Env, account: Address) -> UserRecord {
        get_user(&env, &DataKey::User(account))
    }

    pub fn price_per_30d(env: Env) -> Result<i128, Error> {
        get_price(&env)
    }

    pub fn grace_seconds(env: Env) -> u64 {
        get_grace(&env)
    }

    pub fn is_paused(env: Env) -> bool {
        paused_flag(&env)
    }

    pub fn treasury(env: Env) -> Result<Address, Error> {
        get_treasury(&env)
    }

    pub fn payment_token(env: Env) -> Result<Address, Error> {
        get_payment_token(&env)
    }

    pub fn admin(env: Env) -> Result<Address, Error> {
        get_admin(&env)
    }

    pub fn operator(env: Env) -> Result<Address, Error> {
        env.storage()
            .instance()
            .get(&DataKey::Operator)
            .ok_or(Error::NotInitialized)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Shared body of `subscribe` and `renew`.
fn purchase(env: &Env, payer: Address, periods: u32, payment: i128) -> Result<u64, Error> {
    let price = get_price(env)?;

    payer.require_auth();

    if paused_flag(env) {
        return Err(Error::Paused);
    }
    if periods == 0 || payment < 0 {
        return Err(Error::InvalidArgument);
    }
    let required = price
        .checked_mul(i128::from(periods))
        .ok_or(Error::Overflow)?;
    if payment < required {
        return Err(Error::InsufficientPayment);
    }
    let duration = u64::from(periods)
        .checked_mul(SECONDS_PER_PERIOD)
        .ok_or(Error::Overflow)?;

    let key = DataKey::User(payer.clone());
    let mut record = get_user(env, &key);
    record.expiry = extend_from(env.ledger().timestamp(), record.expiry, duration)?;

    if payment > 0 {
        let token = TokenClient::new(env, &get_payment_token(env)?);
        token.transfer(&payer, &env.current_contract_address(), &payment);
    }

    set_user(env, &key, &record);

    Subscribed {
        account: payer,
        periods,
        expiry: record.expiry,
        amount_paid: payment,
    }
    .publish(env);

    Ok(record.expiry)
}

/// New expiry after adding `duration` to the later of `now` and `expiry`.
fn extend_from(now: u64, expiry: u64, duration: u64) -> Result<u64, Error> {
    now.max(expiry).checked_add(duration).ok_or(Error::Overflow)
}

/// Activity rule used by `is_active`. Grace never reaches storage.
fn entitled_at(record: &UserRecord, now: u64, grace: u64) -> bool {
    !record.revoked && record.expiry != 0 && now < record.expiry.saturating_add(grace)
}

/// Verify that `caller` signed and holds the admin capability (owner or
/// operator).
fn require_admin_capability(env: &Env, caller: &Address) -> Result<(), Error> {
    let admin = get_admin(env)?;
    let operator: Address = env
        .storage()
        .instance()
        .get(&DataKey::Operator)
        .ok_or(Error::NotInitialized)?;
    caller.require_auth();
    if caller != &admin && caller != &operator {
        return Err(Error::Unauthorized);
    }
    Ok(())
}

/// Verify that `caller` signed and is the owner.
fn require_owner(env: &Env, caller: &Address) -> Result<(), Error> {
    let admin = get_admin(env)?;
    caller.require_auth();
    if caller != &admin {
        return Err(Error::Unauthorized);
    }
    Ok(())
}

fn get_admin(env: &Env) -> Result<Address, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Admin)
        .ok_or(Error::NotInitialized)
}

fn get_price(env: &Env) -> Result<i128, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Price)
        .ok_or(Error::NotInitialized)
}

fn get_treasury(env: &Env) -> Result<Address, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Treasury)
        .ok_or(Error::NotInitialized)
}

fn get_payment_token(env: &Env) -> Result<Address, Error> {
    env.storage()
        .instance()
        .get(&DataKey::PaymentToken)
        .ok_or(Error::NotInitialized)
}

fn get_grace(env: &Env) -> u64 {
    env.storage().instance().get(&DataKey::Grace).unwrap_or(0)
}

fn paused_flag(env: &Env) -> bool {
    env.storage()
        .instance()
        .get(&DataKey::Paused)
        .unwrap_or(false)
}

fn get_user(env: &Env, key: &DataKey) -> UserRecord {
    env.storage().persistent().get(key).unwrap_or_default()
}

fn set_user(env: &Env, key: &DataKey, record: &UserRecord) {
    env.storage().persistent().set(key, record);
    env.storage()
        .persistent()
        .extend_ttl(key, PERSISTENT_BUMP_THRESHOLD, PERSISTENT_BUMP_LEDGERS);
    bump_instance(env);
}

fn bump_instance(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(PERSISTENT_BUMP_THRESHOLD, PERSISTENT_BUMP_LEDGERS);
}
