mod reduce;
mod support;
