//! End-to-end scenarios across chunking, storage, retrieval and synthesis.
