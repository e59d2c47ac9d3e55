//! Variable-binding environments for one evaluation pass.

use candle_core::Tensor;

/// An immutable chain of `name -> tensor` bindings.
///
/// The root is empty; each quantifier draw extends it with `child`, so
/// bindings live exactly as long as the subtree evaluation that needs
/// them and inner bindings shadow outer ones of the same name. Nothing is
/// retained between closure calls.
#[derive(Debug, Default)]
pub struct Environment<'p> {
    binding: Option<(&'p str, &'p Tensor)>,
    parent: Option<&'p Environment<'p>>,
}

impl<'p> Environment<'p> {
    /// The empty root environment.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Extends this environment with one binding.
    #[must_use]
    pub fn child<'c>(&'c self, name: &'c str, value: &'c Tensor) -> Environment<'c> {
        Environment {
            binding: Some((name, value)),
            parent: Some(self),
        }
    }

    /// Innermost binding for `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        let mut cursor = Some(self);
        while let Some(env) = cursor {
            if let Some((bound, value)) = env.binding {
                if bound == name {
                    return Some(value);
                }
            }
            cursor = env.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn scalar(v: f32) -> Tensor {
        Tensor::new(v, &Device::Cpu).unwrap()
    }

    #[test]
    fn root_is_empty() {
        assert!(Environment::root().get("x").is_none());
    }

    #[test]
    fn child_binds_and_parent_stays_clean() {
        let root = Environment::root();
        let x = scalar(1.0);
        let child = root.child("x", &x);
        assert_eq!(child.get("x").unwrap().to_scalar::<f32>().unwrap(), 1.0);
        assert!(root.get("x").is_none());
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let root = Environment::root();
        let outer = scalar(1.0);
        let inner = scalar(2.0);
        let mid = root.child("x", &outer);
        let leaf = mid.child("x", &inner);
        assert_eq!(leaf.get("x").unwrap().to_scalar::<f32>().unwrap(), 2.0);
        assert_eq!(mid.get("x").unwrap().to_scalar::<f32>().unwrap(), 1.0);
    }

    #[test]
    fn outer_bindings_remain_visible() {
        let root = Environment::root();
        let x = scalar(1.0);
        let y = scalar(2.0);
        let with_x = root.child("x", &x);
        let with_xy = with_x.child("y", &y);
        assert_eq!(with_xy.get("x").unwrap().to_scalar::<f32>().unwrap(), 1.0);
        assert_eq!(with_xy.get("y").unwrap().to_scalar::<f32>().unwrap(), 2.0);
        assert!(with_xy.get("z").is_none());
    }
}
