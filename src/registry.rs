//! The registry of defined tracepoints.

use log::warn;

use crate::common::Addr;
use crate::debugger::{Debugger, Sal, TraceValue};
use crate::error::InputError;

/// A passive probe at a target PC.
///
/// When hit, the probe executes its action list and appends a trace frame
/// to the target's trace buffer. Host-side state only; nothing reaches the
/// stub until `tstart` downloads the registry.
#[derive(Debug, Clone)]
pub struct Tracepoint {
    /// Stable 1-based number, assigned at creation, never reused within a
    /// session.
    pub number: u32,
    /// Address the probe fires at.
    pub address: Addr,
    /// Source path rebuilt from the defining symtab, for re-display.
    pub source_file: Option<String>,
    pub line_number: u32,
    /// The location spec the user typed, for re-display and script
    /// emission.
    pub addr_string: Option<String>,
    pub cond_string: Option<String>,
    /// Language in effect at creation; later re-parses of the tracepoint's
    /// expressions happen in this context.
    pub language: String,
    /// Input radix in effect at creation.
    pub input_radix: u32,
    pub enabled: bool,
    /// Stop collection after this many hits; 0 means no limit.
    pub pass_count: u64,
    /// Instructions to single-step after a hit. 0 = no stepping actions,
    /// -1 = `while-stepping` given without a count.
    pub step_count: i64,
    /// Action lines, verbatim and in entry order.
    pub actions: Vec<String>,
}

/// Ordered collection of tracepoints.
///
/// Iteration order equals insertion order, numbers increase along the
/// chain, and the creation count never decreases.
#[derive(Debug, Default)]
pub struct TracepointRegistry {
    tracepoints: Vec<Tracepoint>,
    count: u32,
}

impl TracepointRegistry {
    pub fn new() -> TracepointRegistry {
        TracepointRegistry::default()
    }

    /// Number of the most recently created tracepoint. Monotonic; survives
    /// deletions.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn len(&self) -> usize {
        self.tracepoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracepoints.is_empty()
    }

    /// Tracepoints in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Tracepoint> {
        self.tracepoints.iter()
    }

    pub fn get(&self, number: u32) -> Option<&Tracepoint> {
        self.tracepoints.iter().find(|t| t.number == number)
    }

    pub fn get_mut(&mut self, number: u32) -> Option<&mut Tracepoint> {
        self.tracepoints.iter_mut().find(|t| t.number == number)
    }

    /// Create a tracepoint at `sal`, append it to the chain, and assign the
    /// next number. Mirrors the new count into the `tpnum` convenience
    /// variable and notifies the UI hook.
    ///
    /// Validate the location *before* calling; creation itself cannot fail.
    pub fn create<D: Debugger>(
        &mut self,
        dbg: &mut D,
        sal: &Sal,
        addr_string: Option<String>,
    ) -> u32 {
        self.count += 1;
        let t = Tracepoint {
            number: self.count,
            address: sal.pc,
            source_file: sal.file.as_ref().map(|f| f.path()),
            line_number: sal.line,
            addr_string,
            cond_string: None,
            language: dbg.current_language(),
            input_radix: dbg.input_radix(),
            enabled: true,
            pass_count: 0,
            step_count: 0,
            actions: Vec::new(),
        };
        dbg.set_var("tpnum", TraceValue::Int(self.count as i64));
        dbg.tracepoint_created(&t);
        self.tracepoints.push(t);
        self.count
    }

    /// Unlink and drop tracepoint `number`, notifying the UI hook.
    pub fn delete<D: Debugger>(&mut self, dbg: &mut D, number: u32) -> bool {
        match self.tracepoints.iter().position(|t| t.number == number) {
            Some(pos) => {
                let t = self.tracepoints.remove(pos);
                dbg.tracepoint_deleted(&t);
                true
            }
            None => false,
        }
    }

    /// Resolve one tracepoint spec token: a decimal number, a `$var`
    /// convenience variable (must be integer-typed), or empty for the most
    /// recently created tracepoint. Warns and returns `None` when no
    /// tracepoint matches.
    pub fn lookup_token<D: Debugger>(
        &self,
        dbg: &D,
        token: &str,
    ) -> Result<Option<u32>, InputError> {
        let token = token.trim();
        let num: i64 = if token.is_empty() {
            i64::from(self.count)
        } else if let Some(name) = token.strip_prefix('$') {
            match dbg.get_var(name) {
                Some(TraceValue::Int(n)) => n,
                _ => return Err(InputError::VariableNotInteger(name.to_string())),
            }
        } else {
            token.parse::<i64>().unwrap_or(0)
        };

        match self.tracepoints.iter().find(|t| i64::from(t.number) == num) {
            Some(t) => Ok(Some(t.number)),
            None => {
                warn!("no tracepoint number {}", num);
                Ok(None)
            }
        }
    }

    /// Numbers selected by a space-separated list of spec tokens; an empty
    /// list selects every tracepoint.
    pub fn resolve_spec_list<D: Debugger>(
        &self,
        dbg: &D,
        args: &str,
    ) -> Result<Vec<u32>, InputError> {
        if args.trim().is_empty() {
            return Ok(self.tracepoints.iter().map(|t| t.number).collect());
        }
        let mut nums = Vec::new();
        for tok in args.split_whitespace() {
            if let Some(n) = self.lookup_token(dbg, tok)? {
                nums.push(n);
            }
        }
        Ok(nums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_sal, TestDebugger};

    #[test]
    fn numbers_increase_in_chain_order() {
        let mut dbg = TestDebugger::new();
        let mut reg = TracepointRegistry::new();
        for pc in [0x1000u64, 0x2000, 0x3000].iter() {
            reg.create(&mut dbg, &test_sal(*pc), None);
        }
        let numbers: Vec<u32> = reg.iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(numbers.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn numbers_are_never_reused() {
        let mut dbg = TestDebugger::new();
        let mut reg = TracepointRegistry::new();
        let first = reg.create(&mut dbg, &test_sal(0x1000), None);
        assert!(reg.delete(&mut dbg, first));
        let second = reg.create(&mut dbg, &test_sal(0x1000), None);

        assert_eq!(reg.len(), 1);
        assert_ne!(first, second);
        assert_eq!(second, 2);
        // the recreated tracepoint has no actions
        assert!(reg.get(second).unwrap().actions.is_empty());
        assert!(reg.count() >= reg.iter().map(|t| t.number).max().unwrap_or(0));
    }

    #[test]
    fn creation_mirrors_tpnum() {
        let mut dbg = TestDebugger::new();
        let mut reg = TracepointRegistry::new();
        reg.create(&mut dbg, &test_sal(0x1000), None);
        reg.create(&mut dbg, &test_sal(0x2000), None);
        assert_eq!(dbg.get_var("tpnum"), Some(TraceValue::Int(2)));
        assert_eq!(dbg.created, vec![1, 2]);
    }

    #[test]
    fn delete_notifies_the_ui() {
        let mut dbg = TestDebugger::new();
        let mut reg = TracepointRegistry::new();
        let n = reg.create(&mut dbg, &test_sal(0x1000), None);
        reg.delete(&mut dbg, n);
        assert_eq!(dbg.deleted, vec![n]);
        assert!(!reg.delete(&mut dbg, n));
    }

    #[test]
    fn lookup_by_number_var_and_empty() {
        let mut dbg = TestDebugger::new();
        let mut reg = TracepointRegistry::new();
        reg.create(&mut dbg, &test_sal(0x1000), None);
        reg.create(&mut dbg, &test_sal(0x2000), None);

        assert_eq!(reg.lookup_token(&dbg, "1").unwrap(), Some(1));
        assert_eq!(reg.lookup_token(&dbg, "").unwrap(), Some(2));
        assert_eq!(reg.lookup_token(&dbg, "7").unwrap(), None);

        dbg.set_var("t", TraceValue::Int(1));
        assert_eq!(reg.lookup_token(&dbg, "$t").unwrap(), Some(1));

        dbg.set_var("s", TraceValue::Str("one".to_string()));
        assert_eq!(
            reg.lookup_token(&dbg, "$s"),
            Err(InputError::VariableNotInteger("s".to_string()))
        );
    }

    #[test]
    fn spec_list_empty_selects_all() {
        let mut dbg = TestDebugger::new();
        let mut reg = TracepointRegistry::new();
        reg.create(&mut dbg, &test_sal(0x1000), None);
        reg.create(&mut dbg, &test_sal(0x2000), None);

        assert_eq!(reg.resolve_spec_list(&dbg, "").unwrap(), vec![1, 2]);
        assert_eq!(reg.resolve_spec_list(&dbg, " 2 1 ").unwrap(), vec![2, 1]);
    }

    #[test]
    fn source_path_has_exactly_one_separator() {
        use crate::debugger::{Sal, SourceFile};
        let mut dbg = TestDebugger::new();
        let mut reg = TracepointRegistry::new();
        let sal = Sal {
            pc: 0x1000,
            line: 10,
            file: Some(SourceFile {
                dirname: "/src/".to_string(),
                filename: "main.c".to_string(),
            }),
        };
        let n = reg.create(&mut dbg, &sal, None);
        assert_eq!(reg.get(n).unwrap().source_file.as_deref(), Some("/src/main.c"));
    }
}
