//! Bitset flag types.

/// Defines a `Copy` bitset newtype with named constants.
///
/// Each flag gets a display label; `Display` prints the set labels joined
/// by commas.
///
/// ```
/// fib_node::define_flags! {
///     /// Link state.
///     pub struct LinkFlags: u8 {
///         const UP = 1 << 0, "up";
///         const PROMISC = 1 << 1, "promisc";
///     }
/// }
///
/// let flags = LinkFlags::UP | LinkFlags::PROMISC;
/// assert!(flags.contains(LinkFlags::UP));
/// assert_eq!(flags.to_string(), "up,promisc");
/// ```
#[macro_export]
macro_rules! define_flags {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident: $repr:ty {
            $(
                $(#[$fmeta:meta])*
                const $flag:ident = $value:expr, $label:literal;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name($repr);

        #[allow(dead_code)]
        impl $name {
            /// No flags set.
            pub const NONE: Self = Self(0);
            $(
                $(#[$fmeta])*
                pub const $flag: Self = Self($value);
            )*

            const NAMED: &'static [(Self, &'static str)] = &[$((Self::$flag, $label)),*];

            pub const fn bits(&self) -> $repr {
                self.0
            }

            pub const fn is_empty(&self) -> bool {
                self.0 == 0
            }

            /// True if every flag of `other` is set.
            pub const fn contains(&self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// True if any flag of `other` is set.
            pub const fn intersects(&self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            pub const fn difference(self, other: Self) -> Self {
                Self(self.0 & !other.0)
            }

            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }

            /// Labels of the set flags, lowest bit first.
            pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
                Self::NAMED
                    .iter()
                    .filter(move |(flag, _)| self.contains(*flag) && !flag.is_empty())
                    .map(|(_, label)| *label)
            }
        }

        impl ::std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self::Output {
                Self(self.0 | rhs.0)
            }
        }

        impl ::std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl ::std::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self::Output {
                Self(self.0 & rhs.0)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                for (i, label) in self.labels().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", label)?;
                }
                Ok(())
            }
        }
    };
}
