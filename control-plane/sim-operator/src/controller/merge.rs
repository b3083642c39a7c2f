//! Rendering descriptors into wire objects and merging them into what the
//! store currently holds.
//!
//! The merge only touches fields the desired body names. Maps gain or
//! overwrite keys. Lists of named objects are matched by name, other lists
//! by position, and in both cases the desired list decides which entries
//! exist. Fields the server or other actors filled in on matching entries
//! survive, which keeps a converged object byte-stable.
//!
//! Optional fields this operator owns are the exception: a key listed in
//! [`CLEARED`] is dropped once the desired body stops carrying it, and a key
//! listed in [`REPLACED`] always ends up exactly as desired. Paths use `*` to
//! step into every element of a list.

use kube::api::DynamicObject;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::resources::Kind;
use crate::templates::descriptor::{Attachment, ChildDescriptor, DesiredState};

const CONTAINERS: &[&str] = &["spec", "template", "spec", "containers", "*"];

/// (kind, parent path, keys) set to exactly the desired value, or removed
/// when the desired body omits them.
const REPLACED: &[(Kind, &[&str], &[&str])] = &[
    (Kind::Service, &["spec"], &["selector"]),
    (Kind::ConfigMap, &[], &["data"]),
    (Kind::Deployment, CONTAINERS, &["resources", "args"]),
    (Kind::HttpRoute, &["spec", "rules", "*"], &["backendRefs"]),
];

/// (kind, parent path, keys) removed when the desired body omits them and
/// key-merged otherwise.
const CLEARED: &[(Kind, &[&str], &[&str])] = &[
    (Kind::Deployment, &["spec", "template", "metadata"], &["annotations"]),
    (Kind::Deployment, &["spec", "template", "spec"], &["volumes"]),
    (
        Kind::Deployment,
        CONTAINERS,
        &[
            "env",
            "ports",
            "livenessProbe",
            "readinessProbe",
            "startupProbe",
            "volumeMounts",
        ],
    ),
    (Kind::HttpRoute, &["spec", "rules", "*"], &["timeouts"]),
    (Kind::DestinationRule, &["spec", "trafficPolicy"], &["connectionPool"]),
];

/// Paths never rewritten on an existing object.
const IMMUTABLE: &[(Kind, &[&str])] = &[
    (Kind::Deployment, &["spec", "selector"]),
    (Kind::RoleBinding, &["roleRef"]),
];

fn body_of<T: Serialize>(value: &T) -> Result<Value, serde_json::Error> {
    let mut v = serde_json::to_value(value)?;
    if let Some(map) = v.as_object_mut() {
        for k in ["apiVersion", "kind", "metadata", "status"] {
            map.remove(k);
        }
    }
    Ok(v)
}

fn spec_body<T: Serialize>(spec: &T) -> Result<Value, serde_json::Error> {
    Ok(serde_json::json!({ "spec": serde_json::to_value(spec)? }))
}

/// Wire body of a descriptor without metadata.
pub fn desired_body(desc: &ChildDescriptor) -> Result<Value, serde_json::Error> {
    match &desc.desired {
        DesiredState::ServiceAccount(v) => body_of(v),
        DesiredState::Role(v) => body_of(v),
        DesiredState::RoleBinding(v) => body_of(v),
        DesiredState::ConfigMap(v) => body_of(v),
        DesiredState::Deployment(v) => body_of(v),
        DesiredState::Service(v) => body_of(v),
        DesiredState::Gateway(v) => spec_body(v),
        DesiredState::HttpRoute(v) => spec_body(v),
        DesiredState::ReferenceGrant(v) => spec_body(v),
        DesiredState::DestinationRule(v) => spec_body(v),
    }
}

/// Full object for a first-time create. Owner references are attached here
/// and only here.
pub fn render(desc: &ChildDescriptor) -> Result<DynamicObject, serde_json::Error> {
    let ar = desc.key.kind.api_resource();
    let mut obj = DynamicObject::new(&desc.key.name, &ar).within(&desc.key.namespace);
    obj.metadata.labels = Some(desc.managed_labels());
    if let Attachment::Owned(owner) = &desc.attachment {
        obj.metadata.owner_references = Some(vec![owner.clone()]);
    }
    obj.data = desired_body(desc)?;
    Ok(obj)
}

/// Merge the descriptor into `current`. Returns the object to write back, or
/// `None` when `current` already satisfies the descriptor.
pub fn merge_existing(
    current: &DynamicObject,
    desc: &ChildDescriptor,
) -> Result<Option<DynamicObject>, serde_json::Error> {
    let mut next = current.clone();
    let mut changed = false;

    let labels = next.metadata.labels.get_or_insert_with(Default::default);
    for (k, v) in desc.managed_labels() {
        if labels.get(&k) != Some(&v) {
            labels.insert(k, v);
            changed = true;
        }
    }

    let mut desired = desired_body(desc)?;
    let kind = desc.key.kind;
    for (_, path) in IMMUTABLE.iter().filter(|(k, _)| *k == kind) {
        remove_path(&mut desired, path);
    }
    if !next.data.is_object() {
        next.data = Value::Object(Map::new());
    }
    merge_value(&mut next.data, &desired);

    // After the merge every list in `next` lines up with `desired` by index.
    for (_, parent, keys) in REPLACED.iter().filter(|(k, ..)| *k == kind) {
        let mut replace = |have: &mut Value, want: &Value| {
            for key in *keys {
                match want.get(*key) {
                    Some(v) => {
                        if let Some(map) = have.as_object_mut() {
                            map.insert(key.to_string(), v.clone());
                        }
                    }
                    None => drop_key(have, key),
                }
            }
        };
        for_each_pair(&mut next.data, &desired, parent, &mut replace);
    }
    for (_, parent, keys) in CLEARED.iter().filter(|(k, ..)| *k == kind) {
        let mut clear = |have: &mut Value, want: &Value| {
            for key in keys.iter().filter(|k| want.get(**k).is_none()) {
                drop_key(have, key);
            }
        };
        for_each_pair(&mut next.data, &desired, parent, &mut clear);
    }

    changed |= next.data != current.data;
    Ok(changed.then_some(next))
}

fn drop_key(v: &mut Value, key: &str) {
    if let Some(map) = v.as_object_mut() {
        map.remove(key);
    }
}

/// Visit the nodes at `path` in `current` together with their counterparts
/// in `desired`. Nodes missing on either side are skipped.
fn for_each_pair(
    current: &mut Value,
    desired: &Value,
    path: &[&str],
    f: &mut dyn FnMut(&mut Value, &Value),
) {
    let Some((head, rest)) = path.split_first() else {
        f(current, desired);
        return;
    };
    if *head == "*" {
        if let (Value::Array(cur), Value::Array(want)) = (current, desired) {
            for (c, w) in cur.iter_mut().zip(want) {
                for_each_pair(c, w, rest, f);
            }
        }
        return;
    }
    if let (Some(c), Some(w)) = (current.get_mut(*head), desired.get(*head)) {
        for_each_pair(c, w, rest, f);
    }
}

fn lookup_mut<'a>(v: &'a mut Value, path: &[&str]) -> Option<&'a mut Value> {
    path.iter().try_fold(v, |v, k| v.get_mut(*k))
}

fn remove_path(v: &mut Value, path: &[&str]) {
    let Some((last, parent)) = path.split_last() else {
        return;
    };
    if let Some(Value::Object(map)) = lookup_mut(v, parent) {
        map.remove(*last);
    }
}

fn name_of(v: &Value) -> Option<&str> {
    v.get("name").and_then(Value::as_str)
}

/// Overlay `desired` onto `current`; true when anything changed.
pub fn merge_value(current: &mut Value, desired: &Value) -> bool {
    match (current, desired) {
        (Value::Object(cur), Value::Object(want)) => {
            let mut changed = false;
            for (k, v) in want {
                match cur.get_mut(k) {
                    Some(slot) => changed |= merge_value(slot, v),
                    None => {
                        cur.insert(k.clone(), v.clone());
                        changed = true;
                    }
                }
            }
            changed
        }
        (Value::Array(cur), Value::Array(want))
            if !want.is_empty() && want.iter().all(Value::is_object) =>
        {
            let keyed = want.iter().all(|w| name_of(w).is_some());
            let mut changed = cur.len() != want.len();
            let mut out = Vec::with_capacity(want.len());
            for (i, w) in want.iter().enumerate() {
                let existing = if keyed {
                    cur.iter().position(|c| name_of(c) == name_of(w))
                } else {
                    (i < cur.len()).then_some(i)
                };
                let mut slot = match existing {
                    Some(pos) => {
                        changed |= pos != i;
                        cur[pos].clone()
                    }
                    None => {
                        changed = true;
                        Value::Object(Map::new())
                    }
                };
                changed |= merge_value(&mut slot, w);
                out.push(slot);
            }
            *cur = out;
            changed
        }
        (cur, want) => {
            if cur != want {
                *cur = want.clone();
                true
            } else {
                false
            }
        }
    }
}
