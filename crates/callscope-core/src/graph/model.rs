//! Knowledge graph entity models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Architectural role of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum Layer {
    Controller,
    Service,
    Mapper,
    Repository,
    Util,
    Entity,
    Config,
    Component,
    Unknown,
}

impl Layer {
    pub const ALL: [Layer; 9] = [
        Layer::Controller,
        Layer::Service,
        Layer::Mapper,
        Layer::Repository,
        Layer::Util,
        Layer::Entity,
        Layer::Config,
        Layer::Component,
        Layer::Unknown,
    ];

    /// Parse from string (case-insensitive). Unrecognized input is `Unknown`.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "CONTROLLER" => Self::Controller,
            "SERVICE" => Self::Service,
            "MAPPER" | "DAO" => Self::Mapper,
            "REPOSITORY" => Self::Repository,
            "UTIL" | "UTILS" => Self::Util,
            "ENTITY" => Self::Entity,
            "CONFIG" => Self::Config,
            "COMPONENT" => Self::Component,
            _ => Self::Unknown,
        }
    }

    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Controller => "CONTROLLER",
            Self::Service => "SERVICE",
            Self::Mapper => "MAPPER",
            Self::Repository => "REPOSITORY",
            Self::Util => "UTIL",
            Self::Entity => "ENTITY",
            Self::Config => "CONFIG",
            Self::Component => "COMPONENT",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Infer the layer from annotations, then the class name suffix, then the package.
    pub fn infer(simple_name: &str, annotations: &[String], package: &str) -> Self {
        for annotation in annotations {
            let a = annotation.trim_start_matches('@');
            let layer = match a {
                "RestController" | "Controller" => Self::Controller,
                "Service" => Self::Service,
                "Repository" => Self::Repository,
                "Mapper" => Self::Mapper,
                "Configuration" => Self::Config,
                "Entity" | "Table" => Self::Entity,
                "Component" => Self::Component,
                _ => continue,
            };
            return layer;
        }

        const SUFFIXES: &[(&str, Layer)] = &[
            ("Controller", Layer::Controller),
            ("Resource", Layer::Controller),
            ("ServiceImpl", Layer::Service),
            ("Service", Layer::Service),
            ("Repository", Layer::Repository),
            ("Mapper", Layer::Mapper),
            ("Dao", Layer::Mapper),
            ("DAO", Layer::Mapper),
            ("Utils", Layer::Util),
            ("Util", Layer::Util),
            ("Helper", Layer::Util),
            ("Config", Layer::Config),
            ("Configuration", Layer::Config),
            ("Entity", Layer::Entity),
        ];
        if let Some((_, layer)) = SUFFIXES
            .iter()
            .find(|(suffix, _)| simple_name.ends_with(suffix))
        {
            return *layer;
        }

        for segment in package.rsplit('.') {
            let layer = match segment.to_lowercase().as_str() {
                "controller" | "controllers" | "web" | "api" => Self::Controller,
                "service" | "services" => Self::Service,
                "repository" | "repositories" => Self::Repository,
                "mapper" | "mappers" | "dao" => Self::Mapper,
                "util" | "utils" => Self::Util,
                "config" | "configuration" => Self::Config,
                "entity" | "entities" | "domain" | "model" => Self::Entity,
                _ => continue,
            };
            return layer;
        }

        Self::Unknown
    }
}

impl From<String> for Layer {
    fn from(s: String) -> Self {
        Self::from_str(&s)
    }
}

/// Business domain a class belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum BusinessDomain {
    User,
    Order,
    Product,
    Payment,
    Auth,
    System,
    Common,
    Unknown,
}

impl BusinessDomain {
    /// Parse from string (case-insensitive). Unrecognized input is `Unknown`.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "USER" => Self::User,
            "ORDER" => Self::Order,
            "PRODUCT" => Self::Product,
            "PAYMENT" => Self::Payment,
            "AUTH" => Self::Auth,
            "SYSTEM" => Self::System,
            "COMMON" => Self::Common,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Order => "ORDER",
            Self::Product => "PRODUCT",
            Self::Payment => "PAYMENT",
            Self::Auth => "AUTH",
            Self::System => "SYSTEM",
            Self::Common => "COMMON",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Infer the domain from keywords in the qualified class name.
    pub fn infer(qualified_name: &str) -> Self {
        const KEYWORDS: &[(&[&str], BusinessDomain)] = &[
            (&["payment", "billing", "invoice"], BusinessDomain::Payment),
            (&["order", "cart", "checkout"], BusinessDomain::Order),
            (&["product", "goods", "item", "catalog", "sku"], BusinessDomain::Product),
            (&["auth", "login", "token", "security", "permission"], BusinessDomain::Auth),
            (&["user", "account", "member", "customer"], BusinessDomain::User),
            (&["system", "admin", "config"], BusinessDomain::System),
            (&["common", "util", "base", "shared"], BusinessDomain::Common),
        ];

        let lower = qualified_name.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(words, _)| words.iter().any(|w| lower.contains(w)))
            .map(|(_, domain)| *domain)
            .unwrap_or(Self::Unknown)
    }
}

impl From<String> for BusinessDomain {
    fn from(s: String) -> Self {
        Self::from_str(&s)
    }
}

/// How a call edge was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum CallType {
    Direct,
    Interface,
    Inheritance,
    Static,
    Reflection,
    Async,
    Lambda,
    MethodReference,
}

impl CallType {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "INTERFACE" => Self::Interface,
            "INHERITANCE" => Self::Inheritance,
            "STATIC" => Self::Static,
            "REFLECTION" => Self::Reflection,
            "ASYNC" => Self::Async,
            "LAMBDA" => Self::Lambda,
            "METHOD_REFERENCE" => Self::MethodReference,
            _ => Self::Direct,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "DIRECT",
            Self::Interface => "INTERFACE",
            Self::Inheritance => "INHERITANCE",
            Self::Static => "STATIC",
            Self::Reflection => "REFLECTION",
            Self::Async => "ASYNC",
            Self::Lambda => "LAMBDA",
            Self::MethodReference => "METHOD_REFERENCE",
        }
    }
}

impl From<String> for CallType {
    fn from(s: String) -> Self {
        Self::from_str(&s)
    }
}

/// Method visibility, derived from modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
    Protected,
    Package,
}

/// Node kinds in the external store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Class,
    Method,
}

impl NodeKind {
    /// The store label for this node kind.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Class => "Class",
            Self::Method => "Method",
        }
    }
}

/// Relationship kinds in the external store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Calls,
    Implements,
    Inherits,
    DataFlow,
    Contains,
}

impl EdgeKind {
    /// The store relationship type for this edge kind.
    pub fn rel_type(&self) -> &'static str {
        match self {
            Self::Calls => "CALLS",
            Self::Implements => "IMPLEMENTS",
            Self::Inherits => "EXTENDS",
            Self::DataFlow => "DATA_FLOW",
            Self::Contains => "CONTAINS",
        }
    }
}

fn unset_depth() -> i32 {
    -1
}

/// A class (or interface) extracted from source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassBlock {
    pub id: String,
    /// Fully qualified name.
    pub name: String,
    #[serde(default)]
    pub simple_name: String,
    #[serde(default)]
    pub package: String,
    #[serde(default = "unknown_layer")]
    pub layer: Layer,
    #[serde(default = "unknown_domain")]
    pub business_domain: BusinessDomain,
    #[serde(default)]
    pub super_class: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_interface: bool,
    #[serde(default)]
    pub method_count: usize,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub cross_count: usize,
    #[serde(default)]
    pub weight: f64,
}

fn unknown_layer() -> Layer {
    Layer::Unknown
}

fn unknown_domain() -> BusinessDomain {
    BusinessDomain::Unknown
}

impl ClassBlock {
    /// Create a class with the given id, qualified name and layer.
    pub fn new(id: impl Into<String>, name: impl Into<String>, layer: Layer) -> Self {
        let name = name.into();
        let (package, simple_name) = split_qualified(&name);
        let business_domain = BusinessDomain::infer(&name);
        Self {
            id: id.into(),
            simple_name,
            package,
            name,
            layer,
            business_domain,
            super_class: None,
            interfaces: Vec::new(),
            annotations: Vec::new(),
            is_abstract: false,
            is_interface: false,
            method_count: 0,
            file_path: None,
            cross_count: 0,
            weight: 0.0,
        }
    }

    /// Fill derived naming fields and infer unknown layer/domain.
    pub fn normalize(&mut self) {
        if self.simple_name.is_empty() || self.package.is_empty() {
            let (package, simple_name) = split_qualified(&self.name);
            if self.simple_name.is_empty() {
                self.simple_name = simple_name;
            }
            if self.package.is_empty() {
                self.package = package;
            }
        }
        if self.layer == Layer::Unknown {
            self.layer = Layer::infer(&self.simple_name, &self.annotations, &self.package);
        }
        if self.business_domain == BusinessDomain::Unknown {
            self.business_domain = BusinessDomain::infer(&self.name);
        }
    }
}

fn split_qualified(name: &str) -> (String, String) {
    match name.rsplit_once('.') {
        Some((package, simple)) => (package.to_string(), simple.to_string()),
        None => (String::new(), name.to_string()),
    }
}

/// A method extracted from source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodNode {
    pub id: String,
    pub class_id: String,
    pub name: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub return_type: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub is_constructor: bool,
    #[serde(default)]
    pub cross_count: usize,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub is_root_node: bool,
    #[serde(default = "unset_depth")]
    pub depth: i32,
    #[serde(default)]
    pub tree_ids: BTreeSet<String>,
}

impl MethodNode {
    /// Create a public method owned by `class_id`.
    pub fn new(
        id: impl Into<String>,
        class_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            class_id: class_id.into(),
            signature: format!("{}()", name),
            name,
            return_type: "void".to_string(),
            parameters: Vec::new(),
            modifiers: vec!["public".to_string()],
            annotations: Vec::new(),
            is_constructor: false,
            cross_count: 0,
            weight: 0.0,
            is_root_node: false,
            depth: -1,
            tree_ids: BTreeSet::new(),
        }
    }

    /// Visibility derived from modifiers: public > private > protected > package.
    pub fn visibility(&self) -> Visibility {
        let has = |m: &str| self.modifiers.iter().any(|x| x.eq_ignore_ascii_case(m));
        if has("public") {
            Visibility::Public
        } else if has("private") {
            Visibility::Private
        } else if has("protected") {
            Visibility::Protected
        } else {
            Visibility::Package
        }
    }
}

/// A directed call between two methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEdge {
    pub id: String,
    pub from_method_id: String,
    pub to_method_id: String,
    pub from_class_id: String,
    pub to_class_id: String,
    #[serde(default = "direct_call")]
    pub call_type: CallType,
    #[serde(default = "full_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub cross_count: usize,
    #[serde(default)]
    pub tree_ids: BTreeSet<String>,
}

fn direct_call() -> CallType {
    CallType::Direct
}

fn full_confidence() -> f64 {
    1.0
}

impl CallEdge {
    /// Create a direct call edge. The id is derived from the endpoints.
    pub fn new(from: &MethodNode, to: &MethodNode) -> Self {
        Self {
            id: format!("{}->{}", from.id, to.id),
            from_method_id: from.id.clone(),
            to_method_id: to.id.clone(),
            from_class_id: from.class_id.clone(),
            to_class_id: to.class_id.clone(),
            call_type: CallType::Direct,
            confidence: 1.0,
            line_number: None,
            cross_count: 0,
            tree_ids: BTreeSet::new(),
        }
    }

    pub fn with_call_type(mut self, call_type: CallType) -> Self {
        self.call_type = call_type;
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.from_method_id == self.to_method_id
    }
}

/// A call tree rooted at one entry-point method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTree {
    pub id: String,
    pub root_method_id: String,
    pub root_class_id: String,
    pub name: String,
    pub depth: usize,
    pub node_count: usize,
    pub cross_node_count: usize,
    pub path_count: usize,
    pub depth_limited: bool,
}

impl CallTree {
    /// Tree id for a root method.
    pub fn id_for(root_method_id: &str) -> String {
        format!("tree:{}", root_method_id)
    }
}

/// Parent-to-child membership of a call inside a specific tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNodeRelation {
    pub tree_id: String,
    pub parent_method_id: String,
    pub child_method_id: String,
    pub depth: usize,
    pub path_index: usize,
}

impl TreeNodeRelation {
    pub fn id(&self) -> String {
        format!("{}:{}->{}", self.tree_id, self.parent_method_id, self.child_method_id)
    }
}

/// Shortest route between a tree member and the tree's root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorePath {
    pub id: String,
    pub tree_id: String,
    pub source_method_id: String,
    /// Ordered in call direction: root first, `source_method_id` last.
    pub method_ids: Vec<String>,
    pub path_length: usize,
    pub layer_cross_count: usize,
}

/// Links an interface method to one implementing method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceImplementationMapping {
    pub interface_method_id: String,
    pub implementation_method_id: String,
    #[serde(default)]
    pub interface_class_id: String,
    #[serde(default)]
    pub implementation_class_id: String,
}

impl InterfaceImplementationMapping {
    pub fn id(&self) -> String {
        format!("{}=>{}", self.interface_method_id, self.implementation_method_id)
    }
}

/// Structured facts supplied by the symbol-resolution collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphFacts {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub classes: Vec<ClassBlock>,
    #[serde(default)]
    pub methods: Vec<MethodNode>,
    #[serde(default)]
    pub edges: Vec<CallEdge>,
    #[serde(default)]
    pub implementations: Vec<InterfaceImplementationMapping>,
}
