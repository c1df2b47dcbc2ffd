//! Load-balance objects: the cached forwarding of an entry's chain.
//!
//! A load-balance is built once per (entry, chain) and then updated in
//! place, so everything that points at it keeps pointing at it. Buckets
//! that point at another load-balance hold a lock on it.

use crate::error::Result;
use crate::fib::Fib;
use fib_dpo::{Dpo, HwCommand, LbBucket, LoadBalanceId};
use fib_node::{Index, MemoryUsage};
use fib_types::DpoProto;
use log::{debug, error};

pub type LbIndex = Index<LoadBalance>;

#[derive(Debug, Clone)]
pub struct LoadBalance {
    id: LoadBalanceId,
    proto: DpoProto,
    buckets: Vec<LbBucket>,
    locks: u32,
}

impl LoadBalance {
    pub fn id(&self) -> LoadBalanceId {
        self.id
    }

    pub fn proto(&self) -> DpoProto {
        self.proto
    }

    pub fn buckets(&self) -> &[LbBucket] {
        &self.buckets
    }

    pub fn locks(&self) -> u32 {
        self.locks
    }

    /// The object as a child sees it.
    pub fn dpo(&self) -> Dpo {
        Dpo::LoadBalance {
            proto: self.proto,
            id: self.id,
        }
    }
}

impl Fib {
    /// Builds a new load-balance with one lock held by the caller.
    pub(crate) fn lb_create(&mut self, proto: DpoProto, buckets: Vec<LbBucket>) -> Result<LbIndex> {
        let id = LoadBalanceId::from_raw(self.next_object_id());
        let lb = match self.load_balances.alloc(LoadBalance {
            id,
            proto,
            buckets: buckets.clone(),
            locks: 1,
        }) {
            Ok(lb) => lb,
            Err(e) => {
                self.buckets_release(&buckets);
                return Err(e.into());
            }
        };
        self.load_balance_db.insert(id, lb);
        debug!("LoadBalance: Created {} with {} buckets", id, buckets.len());
        self.hw_enqueue(HwCommand::LoadBalanceBuild { id, proto, buckets });
        Ok(lb)
    }

    /// Replaces the buckets of `lb`. Hardware only hears about it when the
    /// buckets actually changed. The locks held by `buckets` pass to `lb`.
    pub(crate) fn lb_update(&mut self, lb: LbIndex, buckets: Vec<LbBucket>) {
        let Some(object) = self.load_balances.get_mut(lb) else {
            self.buckets_release(&buckets);
            return;
        };
        if object.buckets == buckets {
            self.buckets_release(&buckets);
            return;
        }
        let id = object.id;
        let old = std::mem::replace(&mut object.buckets, buckets.clone());
        debug!("LoadBalance: Updated {} with {} buckets", id, buckets.len());
        self.hw_enqueue(HwCommand::LoadBalanceUpdate { id, buckets });
        self.buckets_release(&old);
    }

    pub(crate) fn lb_lock(&mut self, lb: LbIndex) {
        if let Some(object) = self.load_balances.get_mut(lb) {
            object.locks += 1;
        }
    }

    /// Releases a lock; the last one tears the object down.
    pub(crate) fn lb_unlock(&mut self, lb: LbIndex) {
        let Some(object) = self.load_balances.get_mut(lb) else {
            return;
        };
        let Some(locks) = object.locks.checked_sub(1) else {
            error!("LoadBalance: Unlock of unlocked {}", object.id);
            return;
        };
        object.locks = locks;
        if object.locks > 0 {
            return;
        }
        if let Some(gone) = self.load_balances.free(lb) {
            debug!("LoadBalance: Deleted {}", gone.id);
            self.load_balance_db.remove(&gone.id);
            self.hw_enqueue(HwCommand::LoadBalanceTeardown { id: gone.id });
            self.buckets_release(&gone.buckets);
        }
    }

    pub(crate) fn buckets_release(&mut self, buckets: &[LbBucket]) {
        for bucket in buckets {
            self.dpo_release(&bucket.dpo);
        }
    }

    /// Takes another lock on the object behind `dpo`.
    pub fn dpo_lock(&mut self, dpo: &Dpo) {
        if let Some(lb) = dpo.load_balance().and_then(|id| self.load_balance_db.get(&id).copied()) {
            self.lb_lock(lb);
        }
    }

    /// Releases a forwarding object obtained from
    /// [`Fib::contribute_forwarding`] or locked with [`Fib::dpo_lock`].
    pub fn dpo_release(&mut self, dpo: &Dpo) {
        if let Some(lb) = dpo.load_balance().and_then(|id| self.load_balance_db.get(&id).copied()) {
            self.lb_unlock(lb);
        }
    }

    /// Looks up a load-balance by its hardware id.
    pub fn load_balance(&self, id: LoadBalanceId) -> Option<&LoadBalance> {
        self.load_balance_db
            .get(&id)
            .and_then(|lb| self.load_balances.get(*lb))
    }

    pub(crate) fn lb_get(&self, lb: LbIndex) -> Option<&LoadBalance> {
        self.load_balances.get(lb)
    }

    pub(crate) fn lb_memory_usage(&self) -> MemoryUsage {
        MemoryUsage {
            name: "Load-balance",
            in_use: self.load_balances.len(),
            allocated: self.load_balances.allocated(),
            element_size: std::mem::size_of::<LoadBalance>(),
        }
    }
}
