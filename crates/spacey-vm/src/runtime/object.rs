//! JavaScript object representation.
//!
//! A [`JsObject`] is an ordered property table, a prototype link, an
//! extensibility flag and an [`ObjectKind`] holding the internal slots of
//! built-in objects. Property tables preserve insertion order; integer keys
//! are reordered on enumeration (see [`JsObject::own_keys`]).
//!
//! Array elements live in a dense vector next to the table as long as they
//! are plain writable data properties. Everything else, including indices
//! far past the end, goes through the table.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use num_bigint::BigInt;
use rustc_hash::FxBuildHasher;

use super::collections::{OrderedMap, WeakTable};
use super::function::{Callable, GeneratorData};
use super::string::JsString;
use super::value::{Symbol, Value, number_to_string};
use crate::gc::{ObjectRef, Trace, Tracer};
use crate::host::{HostObject, RegexProgram};

/// Largest gap of holes an array grows its dense storage across.
const DENSE_GAP: usize = 1024;

/// A property key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// A canonical array index (`"0"` to `"4294967294"`)
    Index(u32),
    /// Any other string
    String(JsString),
    /// A symbol
    Symbol(Symbol),
}

impl PropertyKey {
    /// Builds the key for a string, recognizing array indices.
    pub fn from_name(s: &str) -> Self {
        match parse_index(s.bytes().map(u16::from)) {
            Some(index) => PropertyKey::Index(index),
            None => PropertyKey::String(JsString::from(s)),
        }
    }

    /// Like [`PropertyKey::from_name`] but reuses the string.
    pub fn from_string(s: JsString) -> Self {
        match parse_index(s.as_units().iter().copied()) {
            Some(index) => PropertyKey::Index(index),
            None => PropertyKey::String(s),
        }
    }

    /// Builds the key for a number, as `ToPropertyKey` would.
    pub fn from_number(n: f64) -> Self {
        if n >= 0.0 && n < u32::MAX as f64 && n.fract() == 0.0 {
            PropertyKey::Index(n as u32)
        } else {
            PropertyKey::String(JsString::from(number_to_string(n)))
        }
    }

    /// The array index, if this is one.
    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(index) => Some(*index),
            _ => None,
        }
    }

    /// Whether this is a symbol key.
    pub fn is_symbol(&self) -> bool {
        matches!(self, PropertyKey::Symbol(_))
    }

    /// Whether this key is the given string.
    pub fn is(&self, name: &str) -> bool {
        matches!(self, PropertyKey::String(s) if s.eq_str(name))
    }

    /// The key as string text; a symbol gives its descriptive form.
    pub fn to_js_string(&self) -> JsString {
        match self {
            PropertyKey::Index(index) => JsString::from(index.to_string()),
            PropertyKey::String(s) => s.clone(),
            PropertyKey::Symbol(symbol) => JsString::from(symbol.to_string()),
        }
    }

    /// The key as a script value (indices become strings).
    pub fn to_value(&self) -> Value {
        match self {
            PropertyKey::Index(index) => Value::from(index.to_string()),
            PropertyKey::String(s) => Value::String(s.clone()),
            PropertyKey::Symbol(symbol) => Value::Symbol(symbol.clone()),
        }
    }
}

/// Parses a canonical array index from code units (or UTF-8 bytes, which
/// agree on ASCII digits).
fn parse_index(units: impl ExactSizeIterator<Item = u16>) -> Option<u32> {
    let len = units.len();
    if len == 0 || len > 10 {
        return None;
    }
    let mut value: u64 = 0;
    for (position, unit) in units.enumerate() {
        let digit = match unit {
            0x30..=0x39 => u64::from(unit - 0x30),
            _ => return None,
        };
        if position == 0 && digit == 0 && len > 1 {
            return None;
        }
        value = value * 10 + digit;
    }
    (value < u32::MAX as u64).then_some(value as u32)
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::from_name(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(index: u32) -> Self {
        PropertyKey::Index(index)
    }
}

impl From<Symbol> for PropertyKey {
    fn from(symbol: Symbol) -> Self {
        PropertyKey::Symbol(symbol)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Index(index) => write!(f, "{index}"),
            PropertyKey::String(s) => write!(f, "{s}"),
            PropertyKey::Symbol(symbol) => write!(f, "{symbol}"),
        }
    }
}

/// Property attributes. Accessors ignore `writable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    /// Assignments change the value
    pub writable: bool,
    /// Visible to `for-in` and `Object.keys`
    pub enumerable: bool,
    /// May be deleted or redefined
    pub configurable: bool,
}

impl Attributes {
    /// Writable, enumerable and configurable: plain assignment.
    pub const ALL: Attributes = Attributes::new(true, true, true);
    /// Built-in methods: writable and configurable but not enumerable.
    pub const HIDDEN: Attributes = Attributes::new(true, false, true);
    /// Function `name` and `length`: configurable only.
    pub const CONFIGURABLE: Attributes = Attributes::new(false, false, true);
    /// Constants such as `Math.PI`.
    pub const FROZEN: Attributes = Attributes::new(false, false, false);

    /// Creates attributes from flags.
    pub const fn new(writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            writable,
            enumerable,
            configurable,
        }
    }
}

/// One slot of a property table.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertySlot {
    /// A value
    Data {
        /// Current value
        value: Value,
        /// Attributes
        attributes: Attributes,
    },
    /// A getter/setter pair
    Accessor {
        /// Getter function
        get: Option<ObjectRef>,
        /// Setter function
        set: Option<ObjectRef>,
        /// Attributes
        attributes: Attributes,
    },
}

impl PropertySlot {
    /// A data slot.
    pub fn data(value: Value, attributes: Attributes) -> Self {
        PropertySlot::Data { value, attributes }
    }

    /// The slot's attributes.
    pub fn attributes(&self) -> Attributes {
        match self {
            PropertySlot::Data { attributes, .. } | PropertySlot::Accessor { attributes, .. } => *attributes,
        }
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        match self {
            PropertySlot::Data { attributes, .. } | PropertySlot::Accessor { attributes, .. } => attributes,
        }
    }

    /// Whether the property shows up in enumeration.
    pub fn enumerable(&self) -> bool {
        self.attributes().enumerable
    }

    /// Whether the property can be deleted or redefined.
    pub fn configurable(&self) -> bool {
        self.attributes().configurable
    }
}

/// A partial property descriptor, as passed to `Object.defineProperty`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyDescriptor {
    /// `value`
    pub value: Option<Value>,
    /// `writable`
    pub writable: Option<bool>,
    /// `get`; `Some(None)` is an explicit `undefined`
    pub get: Option<Option<ObjectRef>>,
    /// `set`; `Some(None)` is an explicit `undefined`
    pub set: Option<Option<ObjectRef>>,
    /// `enumerable`
    pub enumerable: Option<bool>,
    /// `configurable`
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    /// A complete data descriptor.
    pub fn data(value: Value, attributes: Attributes) -> Self {
        Self {
            value: Some(value),
            writable: Some(attributes.writable),
            get: None,
            set: None,
            enumerable: Some(attributes.enumerable),
            configurable: Some(attributes.configurable),
        }
    }

    /// Whether the descriptor has `get` or `set`.
    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    /// Whether the descriptor has `value` or `writable`.
    pub fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }
}

/// Dense storage and `length` of an array.
#[derive(Debug, Clone, Default)]
pub struct ArrayData {
    /// Elements from index 0; holes are [`Value::Empty`]
    pub elements: Vec<Value>,
    /// The `length` property
    pub length: u32,
    /// Whether `length` may change
    pub length_writable: bool,
    /// Some index properties live in the property table
    pub sparse: bool,
}

impl ArrayData {
    /// Array storage holding `elements`.
    pub fn from_elements(elements: Vec<Value>) -> Self {
        Self {
            length: elements.len() as u32,
            elements,
            length_writable: true,
            sparse: false,
        }
    }
}

/// The regular expression of a `RegExp` object.
#[derive(Clone)]
pub struct RegExpData {
    /// Compiled program from the regex engine
    pub program: Arc<dyn RegexProgram>,
    /// Pattern source
    pub source: JsString,
    /// Flags, as given
    pub flags: Arc<str>,
}

impl fmt::Debug for RegExpData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

/// What an array iterator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationKind {
    /// Indices
    Keys,
    /// Elements
    Values,
    /// `[index, element]` pairs
    Entries,
}

/// State of the iterators over array-likes and strings.
#[derive(Debug, Clone)]
pub enum ListIterator {
    /// `Array.prototype.values` and friends; `None` once exhausted
    Array {
        /// The iterated object
        target: Option<Value>,
        /// Next index
        index: u32,
        /// Produced values
        kind: IterationKind,
    },
    /// `String.prototype[Symbol.iterator]`; iterates code points
    String {
        /// The iterated string
        string: JsString,
        /// Code unit index of the next code point
        position: usize,
    },
    /// Map and Set iterators; `None` once exhausted
    Collection {
        /// The iterated `Map` or `Set`
        target: Option<ObjectRef>,
        /// Entry position to resume from
        position: usize,
        /// Produced values
        kind: IterationKind,
    },
}

/// State of a `for-in` enumeration.
#[derive(Debug, Clone)]
pub struct ForInState {
    /// The object whose keys are visited, to skip keys deleted meanwhile
    pub object: Option<ObjectRef>,
    /// Keys collected when the loop started
    pub keys: Vec<PropertyKey>,
    /// Next key to visit
    pub position: usize,
}

/// Internal slots of built-in objects.
#[derive(Debug, Clone, Default)]
pub enum ObjectKind {
    /// Plain object
    #[default]
    Ordinary,
    /// Array exotic object
    Array(ArrayData),
    /// Callable object
    Function(Callable),
    /// Error instance
    Error,
    /// Boolean wrapper
    Boolean(bool),
    /// Number wrapper
    Number(f64),
    /// String wrapper; exposes indices and `length`
    String(JsString),
    /// Symbol wrapper
    Symbol(Symbol),
    /// BigInt wrapper
    BigInt(Arc<BigInt>),
    /// Regular expression
    RegExp(RegExpData),
    /// Unmapped `arguments` object
    Arguments,
    /// Generator instance
    Generator(Box<GeneratorData>),
    /// `Map` instance
    Map(Box<OrderedMap>),
    /// `Set` instance
    Set(Box<OrderedMap>),
    /// `WeakMap` instance
    WeakMap(Box<WeakTable>),
    /// `WeakSet` instance
    WeakSet(Box<WeakTable>),
    /// `Date` instance holding its time value
    Date(f64),
    /// Array or string iterator
    Iterator(ListIterator),
    /// `for-in` key iterator
    ForIn(ForInState),
    /// Object implemented by the host
    Host(HostHandle),
}

/// A host object shared with the embedder.
#[derive(Clone)]
pub struct HostHandle(pub Arc<dyn HostObject>);

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostObject({})", self.0.class_name())
    }
}

/// Ordered property table.
pub type PropertyMap = IndexMap<PropertyKey, PropertySlot, FxBuildHasher>;

/// A JavaScript object.
#[derive(Debug, Clone)]
pub struct JsObject {
    /// The prototype of this object
    pub prototype: Option<ObjectRef>,
    /// Whether new properties may be added
    pub extensible: bool,
    /// Own properties in insertion order
    pub properties: PropertyMap,
    /// Internal slots
    pub kind: ObjectKind,
}

impl JsObject {
    /// Creates a plain object.
    pub fn ordinary(prototype: Option<ObjectRef>) -> Self {
        Self::with_kind(prototype, ObjectKind::Ordinary)
    }

    /// Creates an object with internal slots.
    pub fn with_kind(prototype: Option<ObjectRef>, kind: ObjectKind) -> Self {
        Self {
            prototype,
            extensible: true,
            properties: PropertyMap::default(),
            kind,
        }
    }

    /// Creates an array holding `elements`.
    pub fn array(prototype: Option<ObjectRef>, elements: Vec<Value>) -> Self {
        Self::with_kind(prototype, ObjectKind::Array(ArrayData::from_elements(elements)))
    }

    /// Whether the object has a `[[Call]]` slot.
    pub fn is_callable(&self) -> bool {
        match &self.kind {
            ObjectKind::Function(_) => true,
            ObjectKind::Host(host) => host.0.is_callable(),
            _ => false,
        }
    }

    /// Whether this is an array.
    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array(_))
    }

    /// Entries of a `WeakMap` or `WeakSet`.
    pub fn weak_table(&self) -> Option<&WeakTable> {
        match &self.kind {
            ObjectKind::WeakMap(table) | ObjectKind::WeakSet(table) => Some(table),
            _ => None,
        }
    }

    /// Mutable entries of a `WeakMap` or `WeakSet`.
    pub fn weak_table_mut(&mut self) -> Option<&mut WeakTable> {
        match &mut self.kind {
            ObjectKind::WeakMap(table) | ObjectKind::WeakSet(table) => Some(table),
            _ => None,
        }
    }

    /// Array storage, if this is an array.
    pub fn array_data(&self) -> Option<&ArrayData> {
        match &self.kind {
            ObjectKind::Array(data) => Some(data),
            _ => None,
        }
    }

    /// Adds or replaces a writable, enumerable, configurable data property.
    pub fn insert_data(&mut self, key: PropertyKey, value: Value) {
        self.insert(key, PropertySlot::data(value, Attributes::ALL));
    }

    /// Adds or replaces a non-enumerable data property.
    pub fn insert_hidden(&mut self, key: PropertyKey, value: Value) {
        self.insert(key, PropertySlot::data(value, Attributes::HIDDEN));
    }

    /// Adds or replaces a property without any checks.
    pub fn insert(&mut self, key: PropertyKey, slot: PropertySlot) {
        if let PropertyKey::Index(index) = key
            && let ObjectKind::Array(data) = &mut self.kind
        {
            let plain = matches!(&slot, PropertySlot::Data { attributes, .. } if *attributes == Attributes::ALL);
            if let PropertySlot::Data { value, .. } = &slot
                && plain
                && store_element(data, index, value.clone())
            {
                return;
            }
            if let Some(element) = data.elements.get_mut(index as usize) {
                *element = Value::Empty;
            }
            data.sparse = true;
            if index >= data.length {
                data.length = index + 1;
            }
        }
        self.properties.insert(key, slot);
    }

    /// Looks up an own property.
    pub fn own_property(&self, key: &PropertyKey) -> Option<PropertySlot> {
        match (&self.kind, key) {
            (ObjectKind::Array(data), PropertyKey::Index(index)) => {
                if let Some(value) = data.elements.get(*index as usize)
                    && !matches!(value, Value::Empty)
                {
                    return Some(PropertySlot::data(value.clone(), Attributes::ALL));
                }
            }
            (ObjectKind::Array(data), PropertyKey::String(name)) if name.eq_str("length") => {
                return Some(PropertySlot::data(
                    Value::from(data.length),
                    Attributes::new(data.length_writable, false, false),
                ));
            }
            (ObjectKind::String(s), PropertyKey::Index(index)) => {
                if let Some(unit) = s.get(*index as usize) {
                    let unit = Value::String(JsString::from_units(&[unit]));
                    return Some(PropertySlot::data(unit, Attributes::new(false, true, false)));
                }
            }
            (ObjectKind::String(s), PropertyKey::String(name)) if name.eq_str("length") => {
                return Some(PropertySlot::data(Value::from(s.len()), Attributes::FROZEN));
            }
            _ => {}
        }
        self.properties.get(key).cloned()
    }

    /// Whether an own property exists.
    pub fn has_own(&self, key: &PropertyKey) -> bool {
        self.own_property(key).is_some()
    }

    /// Writes the value of an existing writable data property, or adds a new
    /// one. Returns `false` if the write is not allowed. Accessors are not
    /// invoked; callers handle them first.
    pub fn write_own(&mut self, key: PropertyKey, value: Value) -> bool {
        if let ObjectKind::Array(data) = &mut self.kind {
            match &key {
                PropertyKey::Index(index) => {
                    let existing = data
                        .elements
                        .get(*index as usize)
                        .is_some_and(|v| !matches!(v, Value::Empty));
                    if existing {
                        data.elements[*index as usize] = value;
                        return true;
                    }
                    if !self.properties.contains_key(&key) {
                        if !self.extensible || (*index >= data.length && !data.length_writable) {
                            return false;
                        }
                        self.insert(key, PropertySlot::data(value, Attributes::ALL));
                        return true;
                    }
                }
                PropertyKey::String(name) if name.eq_str("length") => {
                    return match value {
                        Value::Number(n) if n >= 0.0 && n <= u32::MAX as f64 && n.fract() == 0.0 => {
                            self.set_array_length(n as u32)
                        }
                        _ => false,
                    };
                }
                _ => {}
            }
        }
        if let ObjectKind::String(_) = self.kind
            && self.own_property(&key).is_some()
            && !self.properties.contains_key(&key)
        {
            return false;
        }
        match self.properties.get_mut(&key) {
            Some(PropertySlot::Data { value: slot, attributes }) => {
                if !attributes.writable {
                    return false;
                }
                *slot = value;
                true
            }
            Some(PropertySlot::Accessor { .. }) => false,
            None => {
                if !self.extensible {
                    return false;
                }
                self.properties.insert(key, PropertySlot::data(value, Attributes::ALL));
                true
            }
        }
    }

    /// Sets the `length` of an array, deleting elements past the end.
    pub fn set_array_length(&mut self, length: u32) -> bool {
        let ObjectKind::Array(data) = &mut self.kind else {
            return false;
        };
        if length == data.length {
            return true;
        }
        if !data.length_writable {
            return false;
        }
        if (length as usize) < data.elements.len() {
            data.elements.truncate(length as usize);
        }
        data.length = length;
        if data.sparse {
            self.properties
                .retain(|key, _| !matches!(key, PropertyKey::Index(index) if *index >= length));
        }
        true
    }

    /// Removes an own property. Returns `false` if it is not configurable.
    pub fn delete_own(&mut self, key: &PropertyKey) -> bool {
        if matches!(self.kind, ObjectKind::String(_))
            && self.own_property(key).is_some()
            && !self.properties.contains_key(key)
        {
            return false;
        }
        match (&mut self.kind, key) {
            (ObjectKind::Array(data), PropertyKey::Index(index)) => {
                if let Some(element) = data.elements.get_mut(*index as usize)
                    && !matches!(element, Value::Empty)
                {
                    *element = Value::Empty;
                    if *index as usize + 1 == data.elements.len() {
                        while matches!(data.elements.last(), Some(Value::Empty)) {
                            data.elements.pop();
                        }
                    }
                    return true;
                }
            }
            (ObjectKind::Array(_), PropertyKey::String(name)) if name.eq_str("length") => return false,
            _ => {}
        }
        match self.properties.get(key) {
            Some(slot) if !slot.configurable() => false,
            Some(_) => {
                self.properties.shift_remove(key);
                true
            }
            None => true,
        }
    }

    /// Applies a descriptor to an own property following the validation
    /// rules of `[[DefineOwnProperty]]`. Returns `false` when rejected.
    pub fn define_own(&mut self, key: PropertyKey, descriptor: PropertyDescriptor) -> bool {
        if key.is("length")
            && let ObjectKind::Array(data) = &mut self.kind
        {
            if descriptor.is_accessor()
                || descriptor.configurable == Some(true)
                || descriptor.enumerable == Some(true)
            {
                return false;
            }
            if !data.length_writable && descriptor.writable == Some(true) {
                return false;
            }
            if let Some(value) = &descriptor.value {
                let ok = match value {
                    Value::Number(n) if *n >= 0.0 && *n <= u32::MAX as f64 && n.fract() == 0.0 => {
                        self.set_array_length(*n as u32)
                    }
                    _ => false,
                };
                if !ok {
                    return false;
                }
            }
            if descriptor.writable == Some(false)
                && let ObjectKind::Array(data) = &mut self.kind
            {
                data.length_writable = false;
            }
            return true;
        }

        let current = self.own_property(&key);
        let Some(current) = current else {
            if !self.extensible {
                return false;
            }
            if let (ObjectKind::Array(data), PropertyKey::Index(index)) = (&self.kind, &key)
                && *index >= data.length
                && !data.length_writable
            {
                return false;
            }
            let attributes = Attributes::new(
                descriptor.writable.unwrap_or(false),
                descriptor.enumerable.unwrap_or(false),
                descriptor.configurable.unwrap_or(false),
            );
            let slot = if descriptor.is_accessor() {
                PropertySlot::Accessor {
                    get: descriptor.get.flatten(),
                    set: descriptor.set.flatten(),
                    attributes,
                }
            } else {
                PropertySlot::data(descriptor.value.unwrap_or(Value::Undefined), attributes)
            };
            self.insert(key, slot);
            return true;
        };

        let attributes = current.attributes();
        if !attributes.configurable {
            if descriptor.configurable == Some(true) {
                return false;
            }
            if descriptor.enumerable.is_some_and(|e| e != attributes.enumerable) {
                return false;
            }
            match &current {
                PropertySlot::Data { value, attributes } => {
                    if descriptor.is_accessor() {
                        return false;
                    }
                    if !attributes.writable {
                        if descriptor.writable == Some(true) {
                            return false;
                        }
                        if let Some(new_value) = &descriptor.value
                            && !new_value.same_value(value)
                        {
                            return false;
                        }
                    }
                }
                PropertySlot::Accessor { get, set, .. } => {
                    if descriptor.is_data() {
                        return false;
                    }
                    if descriptor.get.is_some_and(|g| g != *get) || descriptor.set.is_some_and(|s| s != *set) {
                        return false;
                    }
                }
            }
        }

        // String wrapper indices and `length` are fixed.
        if matches!(self.kind, ObjectKind::String(_)) && !self.properties.contains_key(&key) {
            return true;
        }

        let mut slot = match (current, descriptor.is_accessor(), descriptor.is_data()) {
            (PropertySlot::Data { attributes, .. }, true, _) => PropertySlot::Accessor {
                get: None,
                set: None,
                attributes: Attributes::new(false, attributes.enumerable, attributes.configurable),
            },
            (PropertySlot::Accessor { attributes, .. }, _, true) => PropertySlot::data(
                Value::Undefined,
                Attributes::new(false, attributes.enumerable, attributes.configurable),
            ),
            (slot, _, _) => slot,
        };
        match &mut slot {
            PropertySlot::Data { value, attributes } => {
                if let Some(new_value) = descriptor.value {
                    *value = new_value;
                }
                if let Some(writable) = descriptor.writable {
                    attributes.writable = writable;
                }
            }
            PropertySlot::Accessor { get, set, .. } => {
                if let Some(new_get) = descriptor.get {
                    *get = new_get;
                }
                if let Some(new_set) = descriptor.set {
                    *set = new_set;
                }
            }
        }
        let attributes = slot.attributes_mut();
        if let Some(enumerable) = descriptor.enumerable {
            attributes.enumerable = enumerable;
        }
        if let Some(configurable) = descriptor.configurable {
            attributes.configurable = configurable;
        }
        self.insert(key, slot);
        true
    }

    /// Own keys in enumeration order: integer indices ascending, then
    /// strings in insertion order, then symbols in insertion order.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let mut indices: Vec<u32> = Vec::new();
        let mut strings: Vec<PropertyKey> = Vec::new();
        let mut symbols: Vec<PropertyKey> = Vec::new();
        match &self.kind {
            ObjectKind::Array(data) => {
                indices.extend(
                    data.elements
                        .iter()
                        .enumerate()
                        .filter(|(_, v)| !matches!(v, Value::Empty))
                        .map(|(i, _)| i as u32),
                );
                strings.push(PropertyKey::from("length"));
            }
            ObjectKind::String(s) => {
                indices.extend(0..s.len() as u32);
                strings.push(PropertyKey::from("length"));
            }
            _ => {}
        }
        for key in self.properties.keys() {
            match key {
                PropertyKey::Index(index) => indices.push(*index),
                PropertyKey::String(_) => strings.push(key.clone()),
                PropertyKey::Symbol(_) => symbols.push(key.clone()),
            }
        }
        indices.sort_unstable();
        indices.dedup();
        indices
            .into_iter()
            .map(PropertyKey::Index)
            .chain(strings)
            .chain(symbols)
            .collect()
    }

    /// Makes every own property non-configurable, and non-writable too
    /// when `freeze` is set, then prevents extensions.
    pub fn seal(&mut self, freeze: bool) {
        self.extensible = false;
        if let ObjectKind::Array(data) = &mut self.kind {
            let elements = std::mem::take(&mut data.elements);
            if freeze {
                data.length_writable = false;
            }
            for (index, value) in elements.into_iter().enumerate() {
                if !matches!(value, Value::Empty) {
                    self.properties.insert(PropertyKey::Index(index as u32), PropertySlot::data(value, Attributes::ALL));
                }
            }
            if let ObjectKind::Array(data) = &mut self.kind {
                data.sparse = true;
            }
            self.properties.sort_by(|a, _, b, _| key_order(a).cmp(&key_order(b)));
        }
        for slot in self.properties.values_mut() {
            match slot {
                PropertySlot::Data { attributes, .. } => {
                    attributes.configurable = false;
                    if freeze {
                        attributes.writable = false;
                    }
                }
                PropertySlot::Accessor { attributes, .. } => attributes.configurable = false,
            }
        }
    }

    /// Whether [`JsObject::seal`] with the same flag would change nothing.
    pub fn is_sealed(&self, frozen: bool) -> bool {
        if self.extensible {
            return false;
        }
        if let ObjectKind::Array(data) = &self.kind {
            if data.elements.iter().any(|v| !matches!(v, Value::Empty)) {
                return false;
            }
            if frozen && data.length_writable {
                return false;
            }
        }
        self.properties.values().all(|slot| match slot {
            PropertySlot::Data { attributes, .. } => !attributes.configurable && (!frozen || !attributes.writable),
            PropertySlot::Accessor { attributes, .. } => !attributes.configurable,
        })
    }
}

fn key_order(key: &PropertyKey) -> (u8, u32) {
    match key {
        PropertyKey::Index(index) => (0, *index),
        _ => (1, 0),
    }
}

/// Stores a plain element in dense storage. Returns `false` when the
/// element has to go into the property table.
fn store_element(data: &mut ArrayData, index: u32, value: Value) -> bool {
    let position = index as usize;
    if position < data.elements.len() {
        data.elements[position] = value;
        return true;
    }
    if data.sparse || position > data.elements.len() + DENSE_GAP {
        return false;
    }
    data.elements.resize(position, Value::Empty);
    data.elements.push(value);
    if index >= data.length {
        data.length = index + 1;
    }
    true
}

impl Trace for JsObject {
    fn trace(&self, tracer: &mut Tracer) {
        if let Some(prototype) = self.prototype {
            tracer.object(prototype);
        }
        for slot in self.properties.values() {
            match slot {
                PropertySlot::Data { value, .. } => tracer.value(value),
                PropertySlot::Accessor { get, set, .. } => {
                    if let Some(get) = get {
                        tracer.object(*get);
                    }
                    if let Some(set) = set {
                        tracer.object(*set);
                    }
                }
            }
        }
        match &self.kind {
            ObjectKind::Array(data) => tracer.values(&data.elements),
            ObjectKind::Function(callable) => callable.trace(tracer),
            ObjectKind::Generator(generator) => generator.trace(tracer),
            ObjectKind::Iterator(ListIterator::Array { target: Some(target), .. }) => tracer.value(target),
            ObjectKind::Iterator(ListIterator::Collection { target: Some(target), .. }) => tracer.object(*target),
            ObjectKind::Map(entries) | ObjectKind::Set(entries) => entries.trace(tracer),
            ObjectKind::WeakMap(table) | ObjectKind::WeakSet(table) => table.trace(tracer),
            ObjectKind::ForIn(state) => {
                if let Some(object) = state.object {
                    tracer.object(object);
                }
            }
            ObjectKind::Host(host) => host.0.trace(tracer),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_key_canonical_index() {
        assert_eq!(PropertyKey::from("0"), PropertyKey::Index(0));
        assert_eq!(PropertyKey::from("42"), PropertyKey::Index(42));
        assert!(matches!(PropertyKey::from("042"), PropertyKey::String(_)));
        assert!(matches!(PropertyKey::from("4294967295"), PropertyKey::String(_)));
        assert!(matches!(PropertyKey::from("-1"), PropertyKey::String(_)));
        assert_eq!(PropertyKey::from_number(3.0), PropertyKey::Index(3));
        assert_eq!(PropertyKey::from_number(1.5), PropertyKey::from("1.5"));
    }

    #[test]
    fn test_enumeration_order() {
        let mut object = JsObject::ordinary(None);
        object.insert_data(PropertyKey::from("b"), Value::Undefined);
        object.insert_data(PropertyKey::from("a"), Value::Undefined);
        object.insert_data(PropertyKey::from("2"), Value::Undefined);
        object.insert_data(PropertyKey::from("1"), Value::Undefined);
        let keys: Vec<String> = object.own_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["1", "2", "b", "a"]);
    }

    #[test]
    fn test_array_dense_and_sparse() {
        let mut array = JsObject::array(None, vec![Value::from(1), Value::from(2)]);
        assert!(array.write_own(PropertyKey::Index(5), Value::from(6)));
        let data = array.array_data().unwrap();
        assert_eq!(data.length, 6);
        assert_eq!(data.elements.len(), 6);
        assert!(!array.has_own(&PropertyKey::Index(3)));

        assert!(array.write_own(PropertyKey::Index(100_000), Value::from(7)));
        assert_eq!(array.array_data().unwrap().length, 100_001);
        assert!(array.array_data().unwrap().sparse);
        assert_eq!(
            array.own_property(&PropertyKey::Index(100_000)),
            Some(PropertySlot::data(Value::from(7), Attributes::ALL))
        );

        assert!(array.set_array_length(1));
        assert!(!array.has_own(&PropertyKey::Index(100_000)));
        assert!(!array.has_own(&PropertyKey::Index(1)));
        assert!(array.has_own(&PropertyKey::Index(0)));
    }

    #[test]
    fn test_define_non_configurable() {
        let mut object = JsObject::ordinary(None);
        assert!(object.define_own(
            PropertyKey::from("x"),
            PropertyDescriptor::data(Value::from(1), Attributes::FROZEN)
        ));
        assert!(!object.write_own(PropertyKey::from("x"), Value::from(2)));
        assert!(!object.delete_own(&PropertyKey::from("x")));
        assert!(!object.define_own(
            PropertyKey::from("x"),
            PropertyDescriptor {
                value: Some(Value::from(2)),
                ..Default::default()
            }
        ));
        assert!(object.define_own(
            PropertyKey::from("x"),
            PropertyDescriptor {
                value: Some(Value::from(1)),
                ..Default::default()
            }
        ));
    }

    #[test]
    fn test_freeze_array() {
        let mut array = JsObject::array(None, vec![Value::from(1)]);
        array.seal(true);
        assert!(array.is_sealed(true));
        assert!(!array.write_own(PropertyKey::Index(0), Value::from(2)));
        assert!(!array.write_own(PropertyKey::Index(1), Value::from(2)));
        assert!(!array.set_array_length(0));
    }

    #[test]
    fn test_string_wrapper_indices() {
        let object = JsObject::with_kind(None, ObjectKind::String(JsString::from("hi")));
        let keys: Vec<String> = object.own_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["0", "1", "length"]);
        assert_eq!(
            object.own_property(&PropertyKey::Index(1)),
            Some(PropertySlot::data(Value::from("i"), Attributes::new(false, true, false)))
        );
    }
}
