pub use anyhow::{bail, ensure, format_err, Context, Error};
pub use argh::FromArgs;
pub use derivative::Derivative;
pub use itertools::Itertools;
pub use log::{debug, info, warn};
pub use ndarray::{s, Array1, Array2, Array3, ArrayView2, Axis};
pub use rand::{rngs::StdRng, Rng, SeedableRng};
pub use serde::{
    de::Error as DeserializeError, ser::Error as SerializeError, Deserialize, Deserializer,
    Serialize, Serializer,
};
pub use std::{
    borrow::Borrow,
    collections::HashMap,
    fs::{self, File},
    io::{prelude::*, BufWriter},
    num::NonZeroUsize,
    path::{Path, PathBuf},
};
pub use tch::{
    nn::{self, Init, VarStore},
    Device, Kind, TchError, Tensor,
};

pub type Fallible<T> = anyhow::Result<T>;
