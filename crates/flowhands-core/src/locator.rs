//! Resilient element lookup in a foreign DOM.
//!
//! A control is described by a [`SelectorSet`]: structural selectors first,
//! then text containment, then positional guesses. Strategies are tried in
//! order and the first one with a match wins. A miss is `Ok(None)`, so
//! callers decide whether the control was optional.

use flowhands_config::{SelectorSet, SelectorStrategy};
use tracing::{debug, trace};

use crate::error::{FlowError, SurfaceError};
use crate::surface::{ElementHandle, PageSurface};

/// Which element to take when a strategy matches several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Pick {
    #[default]
    First,
    Last,
    Nth(usize),
}

impl Pick {
    fn apply(self, mut matches: Vec<ElementHandle>) -> Option<ElementHandle> {
        match self {
            Pick::First => matches.into_iter().next(),
            Pick::Last => matches.pop(),
            Pick::Nth(n) => matches.into_iter().nth(n),
        }
    }
}

/// Element lookup over a [`PageSurface`]. Has no side effects on the page.
pub struct ElementLocator<'a> {
    surface: &'a dyn PageSurface,
}

impl<'a> ElementLocator<'a> {
    pub fn new(surface: &'a dyn PageSurface) -> Self {
        Self { surface }
    }

    /// First element located by the earliest matching strategy.
    pub async fn find(
        &self,
        set: &SelectorSet,
        pick: Pick,
    ) -> Result<Option<ElementHandle>, SurfaceError> {
        for strategy in set.strategies() {
            let matches = self.matches(strategy).await?;
            trace!(strategy = %strategy.describe(), count = matches.len(), "strategy evaluated");
            if let Some(element) = pick.apply(matches) {
                debug!(strategy = %strategy.describe(), element = %element, "element located");
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    /// Like [`find`](Self::find), but a miss is a [`FlowError::NotFound`].
    pub async fn require(
        &self,
        set: &SelectorSet,
        pick: Pick,
        what: &str,
    ) -> Result<ElementHandle, FlowError> {
        self.find(set, pick)
            .await?
            .ok_or_else(|| FlowError::NotFound(what.to_string()))
    }

    /// First element under `scope` whose text contains `needle`
    /// (case-sensitive substring match).
    pub async fn find_by_text(
        &self,
        scope: &str,
        needle: &str,
    ) -> Result<Option<ElementHandle>, SurfaceError> {
        let strategy = SelectorStrategy::text(scope, needle);
        Ok(self.matches(&strategy).await?.into_iter().next())
    }

    /// All elements matched by a single strategy.
    pub async fn matches(
        &self,
        strategy: &SelectorStrategy,
    ) -> Result<Vec<ElementHandle>, SurfaceError> {
        match strategy {
            SelectorStrategy::Css { selector } => self.surface.query_all(selector).await,
            SelectorStrategy::Text { scope, contains } => {
                let mut found = Vec::new();
                for element in self.surface.query_all(scope).await? {
                    match self.surface.text_of(&element).await {
                        Ok(text) if text.contains(contains.as_str()) => found.push(element),
                        Ok(_) | Err(SurfaceError::StaleElement(_)) => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(found)
            }
            SelectorStrategy::Markup { scope, contains } => {
                let mut found = Vec::new();
                for element in self.surface.query_all(scope).await? {
                    match self.surface.markup_of(&element).await {
                        Ok(markup) if markup.contains(contains.as_str()) => found.push(element),
                        Ok(_) | Err(SurfaceError::StaleElement(_)) => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(found)
            }
            SelectorStrategy::Index { scope, index } => Ok(self
                .surface
                .query_all(scope)
                .await?
                .into_iter()
                .nth(*index)
                .into_iter()
                .collect()),
        }
    }
}

#[cfg(test)]
#[path = "locator_tests.rs"]
mod tests;
