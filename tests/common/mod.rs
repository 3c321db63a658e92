//! Shared fixtures: a recording node behavior and the A/A1/A2 scenario tree.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use treeview::domain::{
    DetachedNode, HookContext, HookError, NodeBehavior, NodeId, NodeKey, NodeKind, Tree,
    TreeEvent,
};
use treeview::util::testing;

pub type Log = Rc<RefCell<Vec<String>>>;

pub fn new_log() -> Log {
    testing::init_test_setup();
    Rc::new(RefCell::new(Vec::new()))
}

/// Log entries starting with `prefix`, e.g. `"before_delete"`.
pub fn entries(log: &Log, prefix: &str) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|e| e.starts_with(prefix))
        .cloned()
        .collect()
}

/// Children a [`Recorder`] attaches when populated.
#[derive(Debug, Clone)]
pub struct Blueprint {
    pub kind: NodeKind,
    pub id: String,
    pub display_index: i32,
    pub children: Vec<Blueprint>,
}

impl Blueprint {
    pub fn container(id: &str, display_index: i32, children: Vec<Blueprint>) -> Self {
        Self {
            kind: NodeKind::Container,
            id: id.to_string(),
            display_index,
            children,
        }
    }

    pub fn document(id: &str, display_index: i32) -> Self {
        Self {
            kind: NodeKind::Document,
            id: id.to_string(),
            display_index,
            children: Vec::new(),
        }
    }

    fn to_detached(&self, log: &Log, eager: bool) -> DetachedNode<Recorder> {
        let mut recorder = Recorder::new(&self.id, log);
        recorder.blueprint = self.children.clone();
        recorder.eager = eager;
        DetachedNode::new(self.kind, self.id.clone(), recorder)
            .with_id(NodeId::parse(&self.id).unwrap())
            .with_display_index(self.display_index)
    }
}

/// Node behavior that records every hook call as `"<hook>:<name>"`.
#[derive(Debug, Clone)]
pub struct Recorder {
    pub name: String,
    pub log: Log,
    pub variant: &'static str,
    pub blueprint: Vec<Blueprint>,
    /// Load each attached child right away (nested loads)
    pub eager: bool,
    /// Number of upcoming loads that fail after attaching one child
    pub failing_loads: u32,
    pub refuse_select: bool,
    pub refuse_unselect: bool,
    pub refuse_remove: bool,
    pub refuse_delete: bool,
    pub fail_remove_check: bool,
    pub fail_before_remove: bool,
    pub fail_assign: bool,
    /// Id of a node to select from within `on_selected`
    pub select_on_selected: Option<String>,
}

impl Recorder {
    pub fn new(name: &str, log: &Log) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            variant: "recorder",
            blueprint: Vec::new(),
            eager: false,
            failing_loads: 0,
            refuse_select: false,
            refuse_unselect: false,
            refuse_remove: false,
            refuse_delete: false,
            fail_remove_check: false,
            fail_before_remove: false,
            fail_assign: false,
            select_on_selected: None,
        }
    }

    pub fn with_blueprint(mut self, blueprint: Vec<Blueprint>) -> Self {
        self.blueprint = blueprint;
        self
    }

    fn record(&self, hook: &str) {
        self.log.borrow_mut().push(format!("{}:{}", hook, self.name));
    }
}

impl NodeBehavior for Recorder {
    fn variant(&self) -> &str {
        self.variant
    }

    fn fresh(&self) -> Self {
        let mut recorder = Recorder::new(&self.name, &self.log);
        recorder.variant = self.variant;
        recorder
    }

    fn populate_children(&mut self, ctx: &mut HookContext<'_, Self>) -> Result<(), HookError> {
        self.record("populate");
        let blueprints = self.blueprint.clone();
        for blueprint in &blueprints {
            let key = ctx
                .attach_child(blueprint.to_detached(&self.log, self.eager))
                .map_err(|e| HookError::from_source("attach", e))?;
            if self.failing_loads > 0 {
                self.failing_loads -= 1;
                return Err(HookError::new("backing store unavailable"));
            }
            if let (true, Some(key)) = (self.eager, key) {
                ctx.tree_mut()
                    .ensure_children_loaded(key)
                    .map_err(|e| HookError::from_source("nested load", e))?;
            }
        }
        Ok(())
    }

    fn can_select(&self) -> Result<bool, HookError> {
        Ok(!self.refuse_select)
    }

    fn can_unselect(&self) -> Result<bool, HookError> {
        Ok(!self.refuse_unselect)
    }

    fn can_remove(&self) -> Result<bool, HookError> {
        if self.fail_remove_check {
            return Err(HookError::new("lookup failed"));
        }
        Ok(!self.refuse_remove)
    }

    fn can_delete(&self) -> Result<bool, HookError> {
        Ok(!self.refuse_delete)
    }

    fn before_unselect(&mut self) -> Result<(), HookError> {
        self.record("before_unselect");
        Ok(())
    }

    fn before_remove(&mut self) -> Result<(), HookError> {
        self.record("before_remove");
        if self.fail_before_remove {
            return Err(HookError::new("cleanup failed"));
        }
        Ok(())
    }

    fn before_delete(&mut self) -> Result<(), HookError> {
        self.record("before_delete");
        Ok(())
    }

    fn on_selected(&mut self, ctx: &mut HookContext<'_, Self>) -> Result<(), HookError> {
        self.record("on_selected");
        if let Some(id) = self.select_on_selected.clone() {
            let tree = ctx.tree_mut();
            let target = tree
                .find_by_id(&id)
                .ok_or_else(|| HookError::new(format!("no node {}", id)))?;
            tree.select(target)
                .map_err(|e| HookError::from_source("nested select", e))?;
        }
        Ok(())
    }

    fn on_reset_state(&mut self) -> Result<(), HookError> {
        self.record("reset_state");
        Ok(())
    }

    fn on_assign_to(&self, target: &mut Self) -> Result<(), HookError> {
        self.record("assign");
        if self.fail_assign {
            return Err(HookError::new("copy rejected"));
        }
        target.refuse_remove = self.refuse_remove;
        Ok(())
    }
}

/// Keys of the scenario tree Root -> A(1) -> A1(1), A2(2).
pub struct Scenario {
    pub tree: Tree<Recorder>,
    pub log: Log,
    pub root: NodeKey,
    pub a: NodeKey,
    pub a1: NodeKey,
    pub a2: NodeKey,
}

pub fn scenario_blueprint() -> Vec<Blueprint> {
    vec![Blueprint::container(
        "A",
        1,
        vec![Blueprint::document("A1", 1), Blueprint::document("A2", 2)],
    )]
}

/// Tree whose root populates `blueprint` lazily.
pub fn lazy_tree(log: &Log, blueprint: Vec<Blueprint>) -> Tree<Recorder> {
    let log = log.clone();
    Tree::new(move || -> Result<DetachedNode<Recorder>, HookError> {
        Ok(
            DetachedNode::root("Root", Recorder::new("Root", &log).with_blueprint(blueprint.clone()))
                .with_id(NodeId::parse("root").unwrap()),
        )
    })
}

pub fn scenario() -> Scenario {
    let log = new_log();
    let mut tree = lazy_tree(&log, scenario_blueprint());
    let root = tree.root().unwrap();
    let a = tree.child_at(root, 0).unwrap().unwrap();
    let a1 = tree.child_at(a, 0).unwrap().unwrap();
    let a2 = tree.child_at(a, 1).unwrap().unwrap();
    log.borrow_mut().clear();
    Scenario {
        tree,
        log,
        root,
        a,
        a1,
        a2,
    }
}

/// Record every event emitted by `tree`.
pub fn record_events(tree: &mut Tree<Recorder>) -> Rc<RefCell<Vec<TreeEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    tree.subscribe(move |e| sink.borrow_mut().push(e.clone()));
    events
}

/// Parent links and child lists agree, and every node reaches the root.
pub fn assert_consistent(tree: &Tree<Recorder>) {
    let root = tree.root_key();
    for (key, node) in tree.nodes() {
        match node.parent() {
            Some(parent) => {
                let parent_node = tree.node(parent).expect("parent attached");
                let count = parent_node
                    .loaded_children()
                    .iter()
                    .filter(|&&c| c == key)
                    .count();
                assert_eq!(count, 1, "{} listed once by its parent", node.caption());
            }
            None => assert_eq!(Some(key), root, "{} is the root", node.caption()),
        }
        for &child in node.loaded_children() {
            assert_eq!(tree.node(child).and_then(|c| c.parent()), Some(key));
        }
        let top = tree.ancestors(key).last().copied().unwrap_or(key);
        assert_eq!(Some(top), root, "{} reaches the root", node.caption());
    }
    if let Some(selected) = tree.selected() {
        assert!(tree.contains(selected), "selection is attached");
    }
}
