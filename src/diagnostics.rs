//! Reporting for sources dropped before they ever settled.
//!
//! Each source carries a [`Trace`]: the sites that created it and every
//! operator it was derived through. The trace is an immutable list that new
//! sources extend and share, never a pointer back to the sources themselves.
use std::borrow::Cow;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Where a source was created.
#[derive(Clone, PartialEq, Eq)]
pub struct Site {
    location: &'static Location<'static>,
    label: Option<Cow<'static, str>>,
}

impl Site {
    #[track_caller]
    pub fn caller() -> Self {
        Self {
            location: Location::caller(),
            label: None,
        }
    }

    #[track_caller]
    pub fn labelled(label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            location: Location::caller(),
            label: Some(label.into()),
        }
    }

    /// Same location, different label.
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{label} ({})", self.location),
            None => write!(f, "{}", self.location),
        }
    }
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

struct Node {
    site: Site,
    prev: Option<Arc<Node>>,
}

/// Derivation chain of a source, oldest site first.
#[derive(Clone)]
pub struct Trace {
    head: Arc<Node>,
    len: usize,
}

impl Trace {
    pub fn new(site: Site) -> Self {
        Self {
            head: Arc::new(Node { site, prev: None }),
            len: 1,
        }
    }

    /// A new trace ending in `site`; `self` is left untouched.
    pub fn then(&self, site: Site) -> Self {
        Self {
            head: Arc::new(Node {
                site,
                prev: Some(self.head.clone()),
            }),
            len: self.len + 1,
        }
    }

    /// Number of sites, counting the origin.
    pub fn depth(&self) -> usize {
        self.len
    }

    pub fn last(&self) -> &Site {
        &self.head.site
    }

    pub fn sites(&self) -> Vec<Site> {
        let mut sites = Vec::with_capacity(self.len);
        let mut node = Some(&self.head);
        while let Some(current) = node {
            sites.push(current.site.clone());
            node = current.prev.as_ref();
        }
        sites.reverse();
        sites
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, site) in self.sites().iter().enumerate() {
            if depth > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{site}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.sites()).finish()
    }
}

/// Handed to a [`WarnPolicy::Callback`] reporter.
#[derive(Debug, Clone)]
pub struct UnresolvedReport {
    pub trace: Trace,
    pub value_type: &'static str,
    pub error_type: &'static str,
}

impl fmt::Display for UnresolvedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Source<{}, {}> dropped without being settled; created at {}",
            self.value_type, self.error_type, self.trace
        )
    }
}

pub type Reporter = Arc<dyn Fn(&UnresolvedReport) + Send + Sync + 'static>;

/// What to do when a source is dropped while still unresolved.
#[derive(Clone, Default)]
pub enum WarnPolicy {
    /// Log a `tracing` warning.
    #[default]
    Print,
    /// Log an error and abort the process.
    FatalError,
    Callback(Reporter),
    DontWarn,
}

impl WarnPolicy {
    pub fn callback<F>(reporter: F) -> Self
    where
        F: Fn(&UnresolvedReport) + Send + Sync + 'static,
    {
        WarnPolicy::Callback(Arc::new(reporter))
    }

    pub(crate) fn report(&self, report: UnresolvedReport) {
        match self {
            WarnPolicy::DontWarn => {}
            WarnPolicy::Print => {
                tracing::warn!(trace = %report.trace, "{report}");
            }
            WarnPolicy::FatalError => {
                tracing::error!(trace = %report.trace, "{report}");
                std::process::abort();
            }
            WarnPolicy::Callback(reporter) => reporter(&report),
        }
    }
}

impl fmt::Debug for WarnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarnPolicy::Print => f.write_str("Print"),
            WarnPolicy::FatalError => f.write_str("FatalError"),
            WarnPolicy::Callback(_) => f.write_str("Callback(..)"),
            WarnPolicy::DontWarn => f.write_str("DontWarn"),
        }
    }
}
