// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use super::demo::DemoCase;
use crate::idgen::IdSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Profile,
    ChatSession,
    ChatMessage,
}

/// Assigns fresh ids to copied template entities and rewrites the
/// references between them.
///
/// One remapper is shared by every case of a seeding run, so ids are keyed
/// by entity kind and old id across the whole template.
pub struct IdRemapper<'a> {
    ids: &'a dyn IdSource,
    mapping: HashMap<(EntityKind, i64), i64>,
}

impl<'a> IdRemapper<'a> {
    pub fn new(ids: &'a dyn IdSource) -> Self {
        Self { ids, mapping: HashMap::new() }
    }

    /// Records a fresh id for `old`. Repeated calls for the same old id keep
    /// the first assignment; zero ids are never recorded.
    fn register(&mut self, kind: EntityKind, old: i64) {
        if old != 0 {
            let ids = self.ids;
            self.mapping.entry((kind, old)).or_insert_with(|| ids.next_id());
        }
    }

    /// New id of a referenced entity; zero or unknown references stay empty.
    pub fn lookup(&self, kind: EntityKind, old: Option<i64>) -> Option<i64> {
        old.filter(|id| *id != 0)
            .and_then(|id| self.mapping.get(&(kind, id)).copied())
    }

    /// New primary id; entities without an id get a fresh one.
    fn primary(&self, kind: EntityKind, old: i64) -> i64 {
        self.lookup(kind, Some(old)).unwrap_or_else(|| self.ids.next_id())
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// First pass: reserve ids for every entity of `case`.
    pub fn register_case(&mut self, case: &DemoCase) {
        self.register(EntityKind::Profile, case.profile.id);
        self.register(EntityKind::ChatSession, case.chat_session.id);
        for message in &case.messages {
            self.register(EntityKind::ChatMessage, message.id);
        }
    }

    /// Second pass: rewrite `case` with the reserved ids.
    ///
    /// Every message points at the case's own session. The session keeps a
    /// reference to any template profile and otherwise points at the case's
    /// own profile.
    pub fn rewrite_case(&self, mut case: DemoCase) -> DemoCase {
        let profile_id = self.primary(EntityKind::Profile, case.profile.id);
        let session_id = self.primary(EntityKind::ChatSession, case.chat_session.id);

        case.profile.id = profile_id;
        case.chat_session.id = session_id;
        // a missing or dangling profile reference would leave the session
        // without a friend, so link the case's own profile instead
        case.chat_session.profile_id = self
            .lookup(EntityKind::Profile, case.chat_session.profile_id)
            .or(Some(profile_id));

        for message in &mut case.messages {
            message.id = self.primary(EntityKind::ChatMessage, message.id);
            message.session_id = session_id;
            message.profile_id = self.lookup(EntityKind::Profile, message.profile_id);
            message.parent_id = self.lookup(EntityKind::ChatMessage, message.parent_id);
        }
        case
    }

    /// Remaps every case of a template in two passes.
    pub fn remap(ids: &'a dyn IdSource, cases: Vec<DemoCase>) -> Vec<DemoCase> {
        let mut remapper = Self::new(ids);
        for case in &cases {
            remapper.register_case(case);
        }
        cases.into_iter().map(|case| remapper.rewrite_case(case)).collect()
    }
}
