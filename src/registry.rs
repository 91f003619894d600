//! Reversible method overrides on live method tables.
//!
//! The host dispatches overview methods through per-object [`MethodTable`]s
//! backed by a shared [`ClassDef`]. The [`OverrideRegistry`] swaps
//! implementations in and out of those tables at runtime and hands back an
//! [`OverrideSet`] holding the backups needed to undo the swap exactly.
//!
//! Three override kinds exist, selected by a naming convention on the symbol:
//!
//! - `after_<sym>` chains the override behind the current implementation of
//!   `<sym>`: the original runs first with the original arguments, the
//!   override runs second with the same arguments (its return value is
//!   discarded), and the original's reply is returned.
//! - `vfunc_<sym>` registers the override as a virtual-dispatch hook on the
//!   table's class definition rather than on the table itself. The host
//!   exposes no primitive to remove such a hook, so uninstalling this kind
//!   is a no-op by design; the hook stays until process exit.
//! - anything else replaces the table's own slot for the symbol outright.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tracing::{debug, warn};

use crate::common::collections::{HashMap, HashSet};
use crate::host::{HostCall, HostReply};

pub const AFTER_PREFIX: &str = "after_";
pub const VFUNC_PREFIX: &str = "vfunc_";

/// A single implementation slot. Implementations capture their receiver
/// state; the host's scheduling is single-threaded and cooperative, so plain
/// `Rc` closures are sufficient.
pub type Method = Rc<dyn Fn(HostCall) -> HostReply>;

pub type MethodTableHandle = Rc<RefCell<MethodTable>>;
pub type ClassHandle = Rc<RefCell<ClassDef>>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TableId(u64);

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

impl TableId {
    fn next() -> TableId { TableId(NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed)) }

    pub fn get(&self) -> u64 { self.0 }
}

/// The class-level dispatch table a [`MethodTable`] hangs off. Virtual
/// hooks installed here affect every instance of the class and cannot be
/// removed (the host provides install but no uninstall).
pub struct ClassDef {
    name: &'static str,
    vfuncs: HashMap<String, Method>,
}

impl ClassDef {
    pub fn new(name: &'static str) -> ClassHandle {
        Rc::new(RefCell::new(ClassDef { name, vfuncs: HashMap::default() }))
    }

    pub fn name(&self) -> &'static str { self.name }

    pub fn hook_vfunc(&mut self, symbol: &str, method: Method) {
        debug!(class = self.name, symbol, "hooking virtual dispatch");
        self.vfuncs.insert(symbol.to_string(), method);
    }

    pub fn vfunc(&self, symbol: &str) -> Option<Method> { self.vfuncs.get(symbol).cloned() }
}

/// One object's method table. Resolution falls back to the parent table when
/// a symbol has no own slot, so an absent own slot means "inherited".
pub struct MethodTable {
    id: TableId,
    name: &'static str,
    own: HashMap<String, Method>,
    parent: Option<MethodTableHandle>,
    class: ClassHandle,
}

impl MethodTable {
    pub fn new(name: &'static str, class: ClassHandle) -> MethodTableHandle {
        Self::with_parent(name, class, None)
    }

    pub fn with_parent(
        name: &'static str,
        class: ClassHandle,
        parent: Option<MethodTableHandle>,
    ) -> MethodTableHandle {
        Rc::new(RefCell::new(MethodTable {
            id: TableId::next(),
            name,
            own: HashMap::default(),
            parent,
            class,
        }))
    }

    pub fn id(&self) -> TableId { self.id }

    pub fn name(&self) -> &'static str { self.name }

    pub fn class(&self) -> ClassHandle { self.class.clone() }

    /// Defines (or redefines) an own slot. This is the host-setup path;
    /// overrides go through [`OverrideRegistry::install`] so they can be
    /// undone.
    pub fn define(&mut self, symbol: &str, method: Method) {
        self.own.insert(symbol.to_string(), method);
    }

    pub fn has_own(&self, symbol: &str) -> bool { self.own.contains_key(symbol) }

    /// Resolves a symbol through the own slot, then the parent chain.
    pub fn resolve(&self, symbol: &str) -> Option<Method> {
        if let Some(method) = self.own.get(symbol) {
            return Some(method.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.borrow().resolve(symbol))
    }

    fn insert(&mut self, symbol: String, method: Method) -> Option<Method> {
        self.own.insert(symbol, method)
    }

    fn remove(&mut self, symbol: &str) -> Option<Method> { self.own.remove(symbol) }
}

/// Resolves and invokes `symbol` on `table`. Returns `None` when the symbol
/// does not resolve anywhere on the chain.
pub fn call(table: &MethodTableHandle, symbol: &str, call: HostCall) -> Option<HostReply> {
    let method = table.borrow().resolve(symbol)?;
    Some(method(call))
}

#[derive(Debug, Error)]
pub enum OverrideError {
    /// The symbol is already overridden by a live [`OverrideSet`] on the
    /// same table. Installing twice would make the backups ambiguous and a
    /// second uninstall would leave the table in an undefined state, so the
    /// install is refused before any slot is touched.
    #[error("symbol `{symbol}` on `{table}` is already overridden")]
    DoubleInstall { table: &'static str, symbol: String },
}

enum Backup {
    /// The prior own slot; `None` means the symbol was inherited and the
    /// own slot must be removed again on uninstall.
    Replaced(Option<Method>),
    /// The resolved pre-chain implementation. Restoring writes it into the
    /// own slot, which is observationally identical to the pre-chain state
    /// even when the original was inherited.
    Chained(Method),
    /// Bookkeeping only; virtual hooks cannot be removed.
    VirtualHook,
}

struct OverrideRecord {
    symbol: String,
    backup: Backup,
}

/// The backups from one `install` call, grouped so a component can reverse
/// exactly its own overrides without disturbing anyone else's.
pub struct OverrideSet {
    table: MethodTableHandle,
    records: Vec<OverrideRecord>,
}

// Methods are opaque closures, so report the table and the touched symbols.
impl std::fmt::Debug for OverrideSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideSet")
            .field("table", &self.table.borrow().name())
            .field(
                "symbols",
                &self.records.iter().map(|record| record.symbol.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl OverrideSet {
    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }
}

/// Tracks which symbols are live-overridden per table so that double
/// installs are refused rather than silently corrupting the backups.
#[derive(Default)]
pub struct OverrideRegistry {
    live: HashMap<TableId, HashSet<String>>,
}

impl OverrideRegistry {
    pub fn new() -> OverrideRegistry { OverrideRegistry::default() }

    /// Installs `overrides` on `table` and returns the backups. Entries are
    /// applied in order; kinds are selected by the symbol prefix (see module
    /// docs). The table is untouched if any entry would double-install.
    pub fn install(
        &mut self,
        table: &MethodTableHandle,
        overrides: Vec<(String, Method)>,
    ) -> Result<OverrideSet, OverrideError> {
        let (table_id, table_name) = {
            let table = table.borrow();
            (table.id(), table.name())
        };

        let live = self.live.entry(table_id).or_default();
        let mut incoming: HashSet<String> = HashSet::default();
        for (symbol, _) in &overrides {
            let slot = effective_slot(symbol);
            if live.contains(&slot) || !incoming.insert(slot) {
                return Err(OverrideError::DoubleInstall {
                    table: table_name,
                    symbol: symbol.clone(),
                });
            }
        }

        let mut records = Vec::with_capacity(overrides.len());
        for (symbol, method) in overrides {
            let slot = effective_slot(&symbol);
            if let Some(actual) = symbol.strip_prefix(AFTER_PREFIX) {
                let Some(original) = table.borrow().resolve(actual) else {
                    warn!(
                        table = table_name,
                        symbol = actual,
                        "cannot chain after a symbol that does not resolve; skipping"
                    );
                    continue;
                };
                let chained_original = original.clone();
                let chained: Method = Rc::new(move |args: HostCall| {
                    let reply = chained_original(args.clone());
                    let _ = method(args);
                    reply
                });
                table.borrow_mut().insert(actual.to_string(), chained);
                records.push(OverrideRecord {
                    symbol: actual.to_string(),
                    backup: Backup::Chained(original),
                });
            } else if let Some(hook) = symbol.strip_prefix(VFUNC_PREFIX) {
                let class = table.borrow().class();
                class.borrow_mut().hook_vfunc(hook, method);
                records.push(OverrideRecord { symbol, backup: Backup::VirtualHook });
            } else {
                let prior = table.borrow_mut().insert(symbol.clone(), method);
                records.push(OverrideRecord {
                    symbol,
                    backup: Backup::Replaced(prior),
                });
            }
            live.insert(slot);
        }

        debug!(table = table_name, count = records.len(), "installed override set");
        Ok(OverrideSet { table: table.clone(), records })
    }

    /// Restores every backup in `set`, in reverse install order, and releases
    /// the live-symbol bookkeeping. Virtual-hook records are skipped: the
    /// host has no removal primitive, so those hooks stay installed.
    pub fn uninstall(&mut self, set: OverrideSet) {
        let OverrideSet { table, records } = set;
        let (table_id, table_name) = {
            let table = table.borrow();
            (table.id(), table.name())
        };

        for record in records.into_iter().rev() {
            match record.backup {
                Backup::Replaced(Some(method)) | Backup::Chained(method) => {
                    table.borrow_mut().insert(record.symbol.clone(), method);
                }
                Backup::Replaced(None) => {
                    table.borrow_mut().remove(&record.symbol);
                }
                Backup::VirtualHook => {
                    debug!(
                        table = table_name,
                        symbol = %record.symbol,
                        "virtual hook has no removal primitive; leaving it installed"
                    );
                }
            }
            if let Some(live) = self.live.get_mut(&table_id) {
                live.remove(&effective_slot(&record.symbol));
            }
        }

        if self.live.get(&table_id).is_some_and(|live| live.is_empty()) {
            self.live.remove(&table_id);
        }
        debug!(table = table_name, "uninstalled override set");
    }
}

/// The slot an override actually occupies, used for double-install checks.
/// `after_foo` touches the same own slot as a plain `foo` override; vfunc
/// hooks live in the class-level namespace and keep their prefix. Records
/// store symbols already normalized to this form.
fn effective_slot(symbol: &str) -> String {
    match symbol.strip_prefix(AFTER_PREFIX) {
        Some(actual) => actual.to_string(),
        None => symbol.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::common::geometry::Rect;

    fn spacing_call(row: f64) -> HostCall {
        HostCall::AdjustSpacing {
            row_spacing: Some(row),
            col_spacing: None,
            container: Rect::default(),
        }
    }

    /// A method that adds `delta` to the row spacing and notes the call.
    fn adder(delta: f64, log: Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> Method {
        Rc::new(move |args| {
            log.borrow_mut().push(tag);
            match args {
                HostCall::AdjustSpacing { row_spacing, col_spacing, container } => {
                    HostReply::Spacing {
                        row_spacing: row_spacing.map(|r| r + delta),
                        col_spacing,
                        container,
                    }
                }
                _ => HostReply::Unit,
            }
        })
    }

    fn row_of(reply: HostReply) -> f64 {
        match reply {
            HostReply::Spacing { row_spacing: Some(row), .. } => row,
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    fn test_table() -> MethodTableHandle {
        MethodTable::new("TestLayout", ClassDef::new("TestLayoutClass"))
    }

    #[test]
    fn replace_restores_prior_own_slot() {
        let log = Rc::new(RefCell::new(vec![]));
        let table = test_table();
        table.borrow_mut().define("spacing", adder(1.0, log.clone(), "original"));

        let mut registry = OverrideRegistry::new();
        let set = registry
            .install(&table, vec![("spacing".into(), adder(10.0, log.clone(), "override"))])
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(row_of(call(&table, "spacing", spacing_call(0.0)).unwrap()), 10.0);

        registry.uninstall(set);
        assert_eq!(row_of(call(&table, "spacing", spacing_call(0.0)).unwrap()), 1.0);
        assert_eq!(*log.borrow(), vec!["override", "original"]);
    }

    #[test]
    fn replace_of_inherited_symbol_removes_own_slot_on_uninstall() {
        let log = Rc::new(RefCell::new(vec![]));
        let class = ClassDef::new("TestClass");
        let parent = MethodTable::new("Parent", class.clone());
        parent.borrow_mut().define("spacing", adder(1.0, log.clone(), "parent"));
        let child = MethodTable::with_parent("Child", class, Some(parent.clone()));

        let mut registry = OverrideRegistry::new();
        let set = registry
            .install(&child, vec![("spacing".into(), adder(10.0, log.clone(), "override"))])
            .unwrap();
        assert!(child.borrow().has_own("spacing"));
        assert_eq!(row_of(call(&child, "spacing", spacing_call(0.0)).unwrap()), 10.0);

        registry.uninstall(set);
        assert!(!child.borrow().has_own("spacing"));
        assert_eq!(row_of(call(&child, "spacing", spacing_call(0.0)).unwrap()), 1.0);
    }

    #[test]
    fn chain_after_runs_original_first_and_returns_its_reply() {
        let log = Rc::new(RefCell::new(vec![]));
        let table = test_table();
        table.borrow_mut().define("spacing", adder(1.0, log.clone(), "original"));

        let mut registry = OverrideRegistry::new();
        let set = registry
            .install(
                &table,
                vec![("after_spacing".into(), adder(100.0, log.clone(), "after"))],
            )
            .unwrap();

        // The chained addition's return value is discarded.
        assert_eq!(row_of(call(&table, "spacing", spacing_call(5.0)).unwrap()), 6.0);
        assert_eq!(*log.borrow(), vec!["original", "after"]);

        log.borrow_mut().clear();
        registry.uninstall(set);
        assert_eq!(row_of(call(&table, "spacing", spacing_call(5.0)).unwrap()), 6.0);
        assert_eq!(*log.borrow(), vec!["original"]);
    }

    #[test]
    fn chain_after_missing_symbol_is_skipped() {
        let log = Rc::new(RefCell::new(vec![]));
        let table = test_table();

        let mut registry = OverrideRegistry::new();
        let set = registry
            .install(&table, vec![("after_spacing".into(), adder(1.0, log, "after"))])
            .unwrap();
        assert!(set.is_empty());
        assert!(call(&table, "spacing", spacing_call(0.0)).is_none());
        registry.uninstall(set);
    }

    #[test]
    fn vfunc_hooks_class_and_survives_uninstall() {
        let log = Rc::new(RefCell::new(vec![]));
        let class = ClassDef::new("TestClass");
        let table = MethodTable::new("TestLayout", class.clone());

        let mut registry = OverrideRegistry::new();
        let set = registry
            .install(&table, vec![("vfunc_allocate".into(), adder(1.0, log, "vfunc"))])
            .unwrap();

        // The hook lands on the class under the stripped name, not on the
        // table's own slots.
        assert!(class.borrow().vfunc("allocate").is_some());
        assert!(!table.borrow().has_own("vfunc_allocate"));
        assert!(!table.borrow().has_own("allocate"));

        registry.uninstall(set);
        assert!(class.borrow().vfunc("allocate").is_some());
    }

    #[test]
    fn override_set_debug_names_table_and_symbols() {
        let log = Rc::new(RefCell::new(vec![]));
        let table = test_table();
        table.borrow_mut().define("spacing", adder(1.0, log.clone(), "original"));

        let mut registry = OverrideRegistry::new();
        let result: Result<OverrideSet, OverrideError> =
            registry.install(&table, vec![("spacing".into(), adder(10.0, log, "override"))]);
        // Methods are opaque; the rendering identifies the set by table and
        // touched symbols so assertion failures on Results stay readable.
        let set = result.unwrap();
        assert_eq!(
            format!("{set:?}"),
            r#"OverrideSet { table: "TestLayout", symbols: ["spacing"] }"#
        );
        registry.uninstall(set);
    }

    #[test]
    fn double_install_is_refused() {
        let log = Rc::new(RefCell::new(vec![]));
        let table = test_table();
        table.borrow_mut().define("spacing", adder(1.0, log.clone(), "original"));

        let mut registry = OverrideRegistry::new();
        let set = registry
            .install(&table, vec![("spacing".into(), adder(10.0, log.clone(), "first"))])
            .unwrap();

        let err = registry
            .install(&table, vec![("spacing".into(), adder(20.0, log.clone(), "second"))])
            .unwrap_err();
        assert!(matches!(err, OverrideError::DoubleInstall { symbol, .. } if symbol == "spacing"));

        // Chaining onto a replaced symbol is the same slot.
        assert!(
            registry
                .install(&table, vec![("after_spacing".into(), adder(1.0, log.clone(), "after"))])
                .is_err()
        );

        // The refused installs did not disturb the live override.
        assert_eq!(row_of(call(&table, "spacing", spacing_call(0.0)).unwrap()), 10.0);

        registry.uninstall(set);
        assert!(registry.install(&table, vec![("spacing".into(), adder(30.0, log, "third"))]).is_ok());
    }

    #[test]
    fn duplicate_symbols_within_one_install_are_refused() {
        let log = Rc::new(RefCell::new(vec![]));
        let table = test_table();
        table.borrow_mut().define("spacing", adder(1.0, log.clone(), "original"));

        let mut registry = OverrideRegistry::new();
        let err = registry
            .install(
                &table,
                vec![
                    ("spacing".into(), adder(10.0, log.clone(), "a")),
                    ("after_spacing".into(), adder(20.0, log.clone(), "b")),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, OverrideError::DoubleInstall { .. }));

        // Refusal happens before any slot is touched.
        assert_eq!(row_of(call(&table, "spacing", spacing_call(0.0)).unwrap()), 1.0);
    }

    #[test]
    fn independent_sets_do_not_interfere() {
        let log = Rc::new(RefCell::new(vec![]));
        let table = test_table();
        table.borrow_mut().define("spacing", adder(1.0, log.clone(), "original"));
        table.borrow_mut().define("padding", adder(2.0, log.clone(), "original"));

        let mut registry = OverrideRegistry::new();
        let spacing_set = registry
            .install(&table, vec![("spacing".into(), adder(10.0, log.clone(), "s"))])
            .unwrap();
        let padding_set = registry
            .install(&table, vec![("padding".into(), adder(20.0, log.clone(), "p"))])
            .unwrap();

        registry.uninstall(spacing_set);
        assert_eq!(row_of(call(&table, "spacing", spacing_call(0.0)).unwrap()), 1.0);
        assert_eq!(row_of(call(&table, "padding", spacing_call(0.0)).unwrap()), 20.0);
        registry.uninstall(padding_set);
        assert_eq!(row_of(call(&table, "padding", spacing_call(0.0)).unwrap()), 2.0);
    }
}
